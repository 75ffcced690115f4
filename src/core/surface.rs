//! The map field: overlays, the open editing session and the persisted value.

use crate::{
    background::{CompletedTask, Purpose, SessionToken, TaskOutcome, TaskQueue, Ticket},
    core::{config::MapFieldConfig, geo::LatLng},
    input::{EventHandled, PlatformEvent},
    layers::{
        base::{Overlay, OverlayKind, OverlayRef},
        circle::CircleAttrs,
        image::{Corner, GroundOverlayAttrs},
        manager::{CollectionMember, Collections, FieldDocument},
        marker::MarkerAttrs,
        polygon::{PolygonAttrs, PolylineAttrs},
        route::{Location, Route, RouteOptions},
    },
    platform::{GeocodeRequest, GeocodeResult, HandleId, Services},
    session::{
        route::{move_stop, submit_render},
        CircleSession, EditingSession, GeocodeSession, GroundOverlaySession, MarkerSession,
        OverlaySession, PolygonSession, PolylineSession, RouteSession, SessionContext, SessionCore,
        SessionForm, SessionKind,
    },
    traits::OverlayOperations,
    ui::{ModalContent, ModalRegion, OverlayListView, PopupAction},
    MapError, Result,
};

/// The hidden form field the whole surface serializes into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedField {
    name: String,
    value: String,
    revision: u64,
}

impl PersistedField {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current JSON document
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Bumped each time the value actually changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn document(&self) -> Result<FieldDocument> {
        FieldDocument::parse(&self.value)
    }
}

pub struct MapSurface {
    config: MapFieldConfig,
    services: Services,
    overlays: Collections,
    session: Option<EditingSession>,
    tasks: TaskQueue,
    modal: ModalRegion,
    field: PersistedField,
    next_token: u64,
}

impl MapSurface {
    /// An empty surface.
    pub fn new(config: MapFieldConfig, services: Services) -> Result<Self> {
        Self::load(config, services, None)
    }

    /// Rebuild every overlay from a persisted value, then draw and center.
    pub fn load(config: MapFieldConfig, services: Services, value: Option<&str>) -> Result<Self> {
        config.validate()?;
        let document = FieldDocument::parse(value.unwrap_or_default())?;
        let platform = services.platform.clone();
        let mut overlays = Collections::from_document(document, platform.as_ref(), &config.route);

        for overlay in overlays.iter_mut() {
            if let Err(err) = overlay.build_info_content(services.templates.as_ref()) {
                log::warn!("could not build popup for {} {}: {}", overlay.kind(), overlay.id(), err);
            }
        }

        let mut tasks = TaskQueue::new();
        for route in overlays.routes.iter_mut().filter(|route| !route.base().is_deleted()) {
            submit_render(route, &mut tasks, &services);
        }

        let field = PersistedField {
            name: config.field_name.clone(),
            ..Default::default()
        };
        let mut surface = Self {
            config,
            services,
            overlays,
            session: None,
            tasks,
            modal: ModalRegion::new(),
            field,
            next_token: 0,
        };
        surface.update_hidden_field()?;
        surface.center();
        log::debug!(
            "loaded {} overlays into field {:?}",
            surface.overlays.len(),
            surface.field.name
        );
        Ok(surface)
    }

    pub fn config(&self) -> &MapFieldConfig {
        &self.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn overlays(&self) -> &Collections {
        &self.overlays
    }

    pub fn session(&self) -> Option<&EditingSession> {
        self.session.as_ref()
    }

    pub fn modal(&self) -> &ModalRegion {
        &self.modal
    }

    pub fn field(&self) -> &PersistedField {
        &self.field
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    /// Serialize all six collections into the persisted field.
    pub fn update_hidden_field(&mut self) -> Result<&PersistedField> {
        let document = self.overlays.to_value(self.services.platform.as_ref())?;
        let value = serde_json::to_string(&document)?;
        if value != self.field.value {
            self.field.value = value;
            self.field.revision += 1;
            log::debug!(
                "field {:?} rewritten, revision {}",
                self.field.name,
                self.field.revision
            );
        }
        Ok(&self.field)
    }

    /// Fit the viewport to every overlay that is not deleted. Leaves the
    /// viewport alone when nothing has a position.
    pub fn center(&self) {
        let Some(bounds) = self.overlays.bounds() else {
            return;
        };
        let platform = self.services.platform.as_ref();
        if bounds.is_point() {
            platform.set_center(bounds.center());
            platform.set_zoom(self.config.viewport.single_point_zoom);
        } else {
            platform.fit_bounds(bounds);
        }
    }

    pub fn show_modal(&mut self, content: ModalContent, markup: String) {
        self.modal.show(content, markup);
    }

    /// Close the modal region and re-center unless told not to.
    pub fn hide_modal(&mut self, suppress_center: bool) {
        self.modal.hide();
        if !suppress_center {
            self.center();
        }
    }

    pub fn list_view(&mut self) -> OverlayListView<'_> {
        OverlayListView::new(self)
    }

    /// Show the review list in the modal region.
    pub fn show_list(&mut self) -> Result<()> {
        let markup = self.list_view().render()?;
        self.modal.show(ModalContent::OverlayList, markup);
        Ok(())
    }

    /// Re-render the open session's form into the modal region.
    pub fn refresh_session(&mut self) -> Result<()> {
        let (session, cx) = self.split();
        let Some(session) = session.as_mut() else {
            return Ok(());
        };
        let token = session.token();
        let markup = session.render(cx)?;
        self.modal.show(ModalContent::Session(token), markup);
        Ok(())
    }

    fn refresh_list(&mut self) -> Result<()> {
        if self.modal.content() == Some(ModalContent::OverlayList) {
            self.show_list()?;
        }
        Ok(())
    }

    fn split(&mut self) -> (&mut Option<EditingSession>, SessionContext<'_>) {
        (
            &mut self.session,
            SessionContext {
                overlays: &mut self.overlays,
                services: &self.services,
                tasks: &mut self.tasks,
                config: &self.config,
            },
        )
    }

    fn next_core(&mut self, return_to_list: bool) -> Result<SessionCore> {
        if let Some(open) = &self.session {
            log::debug!("{} still open, refusing a new session", open.token());
            return Err(MapError::SessionAlreadyOpen.into());
        }
        self.next_token += 1;
        Ok(SessionCore::new(SessionToken(self.next_token), return_to_list))
    }

    fn open(&mut self, session: EditingSession) -> Result<SessionToken> {
        let token = session.token();
        log::debug!("{token}: editing {}", session.name());
        self.session = Some(session);
        self.refresh_session()?;
        Ok(token)
    }

    fn open_overlay<A: SessionKind>(&mut self, session: OverlaySession<A>) -> Result<SessionToken> {
        self.session = Some(A::wrap(session));
        let (session, cx) = self.split();
        if let Some(open) = session.as_mut().and_then(A::unwrap_mut) {
            A::on_open(&mut SessionForm::new(open, cx))?;
        }
        let session = self.session.take().ok_or(MapError::NoActiveSession)?;
        self.open(session)
    }

    fn add_overlay<A: SessionKind>(&mut self, attrs: A) -> Result<SessionToken> {
        let core = self.next_core(false)?;
        let platform = self.services.platform.clone();
        let draft = Overlay::draft(attrs, platform.as_ref());
        self.open_overlay(OverlaySession::open_draft(core, draft, platform.as_ref()))
    }

    pub fn add_marker(&mut self) -> Result<SessionToken> {
        self.add_overlay(MarkerAttrs::at(self.config.viewport.default_center))
    }

    pub fn add_circle(&mut self) -> Result<SessionToken> {
        let defaults = &self.config.defaults;
        let center = self.config.viewport.default_center;
        let attrs = CircleAttrs {
            lat: center.lat,
            lng: center.lng,
            radius: defaults.circle_radius,
            metric: defaults.circle_metric,
            stroke_color: defaults.stroke_color.clone(),
            stroke_opacity: defaults.stroke_opacity,
            stroke_weight: defaults.stroke_weight,
            fill_color: defaults.fill_color.clone(),
            fill_opacity: defaults.fill_opacity,
            ..Default::default()
        };
        self.add_overlay(attrs)
    }

    pub fn add_polygon(&mut self) -> Result<SessionToken> {
        let defaults = &self.config.defaults;
        let attrs = PolygonAttrs {
            stroke_color: defaults.stroke_color.clone(),
            stroke_opacity: defaults.stroke_opacity,
            stroke_weight: defaults.stroke_weight,
            fill_color: defaults.fill_color.clone(),
            fill_opacity: defaults.fill_opacity,
            ..Default::default()
        };
        self.add_overlay(attrs)
    }

    pub fn add_polyline(&mut self) -> Result<SessionToken> {
        let defaults = &self.config.defaults;
        let attrs = PolylineAttrs {
            stroke_color: defaults.stroke_color.clone(),
            stroke_opacity: defaults.stroke_opacity,
            stroke_weight: defaults.stroke_weight,
            ..Default::default()
        };
        self.add_overlay(attrs)
    }

    pub fn add_ground_overlay(&mut self) -> Result<SessionToken> {
        let attrs = GroundOverlayAttrs {
            opacity: self.config.defaults.ground_overlay_opacity,
            ..Default::default()
        };
        self.add_overlay(attrs)
    }

    pub fn add_route(&mut self) -> Result<SessionToken> {
        let core = self.next_core(false)?;
        let platform = self.services.platform.clone();
        let draft = Route::draft(RouteOptions::default(), platform.as_ref(), &self.config.route);
        self.open(EditingSession::Route(RouteSession::open_draft(
            core,
            draft,
            platform.as_ref(),
        )))
    }

    pub fn open_geocode_session(&mut self) -> Result<SessionToken> {
        let core = self.next_core(false)?;
        self.open(EditingSession::Geocode(GeocodeSession::open(core)))
    }

    /// Open an editing session on a saved overlay.
    pub fn edit(&mut self, reference: OverlayRef, show_list: bool) -> Result<SessionToken> {
        if self.overlays.get(reference).is_none() {
            return Err(MapError::UnknownOverlay(reference.to_string()).into());
        }
        match reference.kind {
            OverlayKind::Marker => self.edit_overlay::<MarkerAttrs>(reference.id, show_list),
            OverlayKind::Polygon => self.edit_overlay::<PolygonAttrs>(reference.id, show_list),
            OverlayKind::Polyline => self.edit_overlay::<PolylineAttrs>(reference.id, show_list),
            OverlayKind::Circle => self.edit_overlay::<CircleAttrs>(reference.id, show_list),
            OverlayKind::GroundOverlay => {
                self.edit_overlay::<GroundOverlayAttrs>(reference.id, show_list)
            }
            OverlayKind::Route => {
                let core = self.next_core(show_list)?;
                let platform = self.services.platform.clone();
                let route = find(Route::find_mut(&mut self.overlays, reference.id), reference)?;
                let session = RouteSession::open_saved(core, route, platform.as_ref());
                self.open(EditingSession::Route(session))
            }
        }
    }

    fn edit_overlay<A: SessionKind>(&mut self, id: HandleId, show_list: bool) -> Result<SessionToken> {
        let core = self.next_core(show_list)?;
        let platform = self.services.platform.clone();
        let overlay = find(A::find_mut(&mut self.overlays, id), OverlayRef::new(A::KIND, id))?;
        let session = OverlaySession::open_saved(core, overlay, platform.as_ref());
        self.open_overlay(session)
    }

    fn ensure_not_editing(&self, reference: OverlayRef) -> Result<()> {
        match &self.session {
            Some(session) if session.target() == Some(reference) => {
                Err(MapError::SessionAlreadyOpen.into())
            }
            _ => Ok(()),
        }
    }

    /// Soft delete: hide the overlay but keep it for undo.
    pub fn delete(&mut self, reference: OverlayRef, show_list: bool) -> Result<()> {
        self.ensure_not_editing(reference)?;
        let platform = self.services.platform.clone();
        let overlay = self
            .overlays
            .get_mut(reference)
            .ok_or_else(|| MapError::UnknownOverlay(reference.to_string()))?;
        overlay.remove(platform.as_ref());
        log::debug!("deleted {reference}");
        self.update_hidden_field()?;
        if show_list {
            self.show_list()
        } else {
            self.refresh_list()
        }
    }

    pub fn undo(&mut self, reference: OverlayRef) -> Result<()> {
        let platform = self.services.platform.clone();
        let overlay = self
            .overlays
            .get_mut(reference)
            .ok_or_else(|| MapError::UnknownOverlay(reference.to_string()))?;
        overlay.restore(platform.as_ref());
        log::debug!("restored {reference}");
        // Deleted routes were never routed, or dropped their directions as stale.
        if reference.kind == OverlayKind::Route {
            if let Some(route) = Route::find_mut(&mut self.overlays, reference.id) {
                submit_render(route, &mut self.tasks, &self.services);
            }
        }
        self.update_hidden_field()?;
        self.refresh_list()
    }

    pub fn permanently_delete(&mut self, reference: OverlayRef) -> Result<()> {
        self.ensure_not_editing(reference)?;
        if !self
            .overlays
            .remove_permanently(reference, self.services.platform.as_ref())
        {
            return Err(MapError::UnknownOverlay(reference.to_string()).into());
        }
        log::debug!("permanently deleted {reference}");
        self.update_hidden_field()?;
        self.refresh_list()
    }

    /// Edit or Delete chosen in an overlay's popup.
    pub fn popup_action(&mut self, reference: OverlayRef, action: PopupAction) -> Result<()> {
        match action {
            PopupAction::Edit => self.edit(reference, false).map(|_| ()),
            PopupAction::Delete => self.delete(reference, false),
        }
    }

    fn overlay_form<A: SessionKind>(&mut self) -> Result<SessionForm<'_, OverlaySession<A>>> {
        let (session, cx) = self.split();
        let session = session.as_mut().ok_or(MapError::NoActiveSession)?;
        let found = session.name();
        let session = A::unwrap_mut(session).ok_or(MapError::SessionMismatch {
            expected: A::KIND.name(),
            found,
        })?;
        Ok(SessionForm::new(session, cx))
    }

    pub fn marker_form(&mut self) -> Result<SessionForm<'_, MarkerSession>> {
        self.overlay_form()
    }

    pub fn circle_form(&mut self) -> Result<SessionForm<'_, CircleSession>> {
        self.overlay_form()
    }

    pub fn polygon_form(&mut self) -> Result<SessionForm<'_, PolygonSession>> {
        self.overlay_form()
    }

    pub fn polyline_form(&mut self) -> Result<SessionForm<'_, PolylineSession>> {
        self.overlay_form()
    }

    pub fn ground_overlay_form(&mut self) -> Result<SessionForm<'_, GroundOverlaySession>> {
        self.overlay_form()
    }

    pub fn route_form(&mut self) -> Result<SessionForm<'_, RouteSession>> {
        let (session, cx) = self.split();
        match session.as_mut() {
            Some(EditingSession::Route(route)) => Ok(SessionForm::new(route, cx)),
            Some(other) => Err(MapError::SessionMismatch {
                expected: "route",
                found: other.name(),
            }
            .into()),
            None => Err(MapError::NoActiveSession.into()),
        }
    }

    pub fn geocode_form(&mut self) -> Result<SessionForm<'_, GeocodeSession>> {
        let (session, cx) = self.split();
        match session.as_mut() {
            Some(EditingSession::Geocode(search)) => Ok(SessionForm::new(search, cx)),
            Some(other) => Err(MapError::SessionMismatch {
                expected: "geocode",
                found: other.name(),
            }
            .into()),
            None => Err(MapError::NoActiveSession.into()),
        }
    }

    /// Keep the session's changes. Returns the overlay registered or
    /// updated, if any.
    pub fn commit_session(&mut self) -> Result<Option<OverlayRef>> {
        let session = self.session.take().ok_or(MapError::NoActiveSession)?;
        let return_to_list = session.core().return_to_list();
        let (_, mut cx) = self.split();
        let reference = session.commit(&mut cx)?;
        self.update_hidden_field()?;
        self.close_session_modal(return_to_list)?;
        Ok(reference)
    }

    /// Throw the session's changes away.
    pub fn cancel_session(&mut self) -> Result<()> {
        let session = self.session.take().ok_or(MapError::NoActiveSession)?;
        let return_to_list = session.core().return_to_list();
        let (_, mut cx) = self.split();
        session.cancel(&mut cx)?;
        self.update_hidden_field()?;
        self.close_session_modal(return_to_list)
    }

    fn close_session_modal(&mut self, return_to_list: bool) -> Result<()> {
        if return_to_list {
            self.show_list()
        } else {
            self.hide_modal(false);
            Ok(())
        }
    }

    /// React to something the user did directly on the map.
    pub fn handle_event(&mut self, event: PlatformEvent) -> Result<EventHandled> {
        if let PlatformEvent::MapClick { position } = event {
            return self.map_click(position);
        }
        let Some(handle) = event.handle() else {
            return Ok(EventHandled::NotHandled);
        };
        let Some(owner) = self.owner_of(handle) else {
            log::debug!("event for unknown handle {handle}");
            return Ok(EventHandled::NotHandled);
        };
        let platform = self.services.platform.clone();
        let platform = platform.as_ref();
        let session = self.session_for(owner);

        match (event, owner.kind) {
            (PlatformEvent::Click { .. }, _) => {
                for overlay in self.overlays.iter_mut() {
                    if overlay.id() != owner.id {
                        overlay.close_popup(platform);
                    }
                }
                if let Some(overlay) = self.overlays.get_mut(owner) {
                    overlay.open_popup(platform);
                }
                return Ok(EventHandled::Handled);
            }
            (PlatformEvent::DragEnd { position, .. }, OverlayKind::Marker) => {
                let Some(marker) = live::<MarkerAttrs>(&mut self.session, &mut self.overlays, owner.id) else {
                    return Ok(EventHandled::NotHandled);
                };
                marker.move_to(platform, position);
                let ticket = Ticket::new(Purpose::MarkerAddress, owner, marker.generation())
                    .in_session(session);
                self.tasks.geocode(
                    ticket,
                    self.services.geocoder.clone(),
                    GeocodeRequest::Location(position),
                );
            }
            (PlatformEvent::DragEnd { position, .. }, OverlayKind::Route) => {
                let Some(route) = live_route(&mut self.session, &mut self.overlays, owner.id) else {
                    return Ok(EventHandled::NotHandled);
                };
                let Some(index) = route.marker_index(handle) else {
                    return Ok(EventHandled::NotHandled);
                };
                move_stop(route, index, position, &mut self.tasks, &self.services, session)?;
            }
            (
                PlatformEvent::DragEnd { position: center, .. }
                | PlatformEvent::CenterChanged { center, .. },
                OverlayKind::Circle,
            ) => {
                let Some(circle) = live::<CircleAttrs>(&mut self.session, &mut self.overlays, owner.id) else {
                    return Ok(EventHandled::NotHandled);
                };
                circle.center_changed(center);
            }
            (PlatformEvent::RadiusChanged { meters, .. }, OverlayKind::Circle) => {
                let Some(circle) = live::<CircleAttrs>(&mut self.session, &mut self.overlays, owner.id) else {
                    return Ok(EventHandled::NotHandled);
                };
                circle.radius_changed(meters);
            }
            (PlatformEvent::PathChanged { path, .. }, OverlayKind::Polygon) => {
                let Some(polygon) = live::<PolygonAttrs>(&mut self.session, &mut self.overlays, owner.id) else {
                    return Ok(EventHandled::NotHandled);
                };
                polygon.path_changed(path);
            }
            (PlatformEvent::PathChanged { path, .. }, OverlayKind::Polyline) => {
                let Some(polyline) = live::<PolylineAttrs>(&mut self.session, &mut self.overlays, owner.id) else {
                    return Ok(EventHandled::NotHandled);
                };
                polyline.path_changed(path);
            }
            _ => return Ok(EventHandled::NotHandled),
        }

        self.after_change(owner)?;
        Ok(EventHandled::Handled)
    }

    fn map_click(&mut self, position: LatLng) -> Result<EventHandled> {
        match self.session.as_ref().and_then(EditingSession::kind) {
            Some(OverlayKind::Marker) => self.marker_form()?.set_position(position)?,
            Some(OverlayKind::Circle) => self.circle_form()?.set_center(position)?,
            Some(OverlayKind::Polygon) => self.polygon_form()?.add_point(position)?,
            Some(OverlayKind::Polyline) => self.polyline_form()?.add_point(position)?,
            Some(OverlayKind::Route) => self.route_form()?.add_location(position)?,
            Some(OverlayKind::GroundOverlay) | None => return Ok(EventHandled::NotHandled),
        }
        self.refresh_session()?;
        Ok(EventHandled::Handled)
    }

    /// Owner of a handle: the open session's draft first, then the collections.
    fn owner_of(&self, handle: HandleId) -> Option<OverlayRef> {
        self.session
            .as_ref()
            .and_then(|session| session.draft_owner_of(handle))
            .or_else(|| self.overlays.owner_of(handle))
    }

    fn lookup(&self, reference: OverlayRef) -> Option<&dyn OverlayOperations> {
        self.session
            .as_ref()
            .and_then(EditingSession::draft)
            .filter(|draft| draft.kind() == reference.kind && draft.id() == reference.id)
            .or_else(|| self.overlays.get(reference))
    }

    /// Token of the open session when it edits `reference`.
    fn session_for(&self, reference: OverlayRef) -> Option<SessionToken> {
        self.session
            .as_ref()
            .filter(|session| session.target() == Some(reference))
            .map(EditingSession::token)
    }

    /// Something changed on `reference` outside of a form call.
    fn after_change(&mut self, reference: OverlayRef) -> Result<()> {
        self.update_hidden_field()?;
        if self.session_for(reference).is_some() {
            self.refresh_session()?;
        }
        Ok(())
    }

    /// Apply every result that is already available, without waiting.
    /// Returns how many were applied.
    pub fn pump(&mut self) -> Result<usize> {
        let mut applied = 0;
        loop {
            let ready = self.tasks.poll_ready();
            if ready.is_empty() {
                return Ok(applied);
            }
            for task in ready {
                if self.apply(task)? {
                    applied += 1;
                }
            }
        }
    }

    /// Wait for every outstanding task, applying results as they come in.
    pub async fn settle(&mut self) -> Result<usize> {
        let mut applied = 0;
        while let Some(task) = self.tasks.next_completed().await {
            if self.apply(task)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    fn apply(&mut self, task: CompletedTask) -> Result<bool> {
        let CompletedTask { ticket, outcome } = task;
        let open = self.session.as_ref().map(EditingSession::token);
        if let Some(token) = ticket.session {
            if open != Some(token) {
                log::debug!("dropping {:?} result of closed {token}", ticket.purpose);
                return Ok(false);
            }
        }

        let Some(target) = ticket.target else {
            return self.apply_search(ticket, outcome);
        };
        match self.lookup(target) {
            Some(overlay) if !overlay.is_deleted() && overlay.generation() == ticket.generation => {}
            _ => {
                log::debug!("dropping stale {:?} result for {target}", ticket.purpose);
                return Ok(false);
            }
        }

        let platform = self.services.platform.clone();
        let platform = platform.as_ref();
        let session = &mut self.session;
        let overlays = &mut self.overlays;
        let applied = match (ticket.purpose, outcome) {
            (Purpose::MarkerAddress, TaskOutcome::Geocode(response)) => {
                let result = first(response, "reverse geocode");
                live::<MarkerAttrs>(session, overlays, target.id)
                    .map(|marker| marker.apply_geocode(platform, result.as_ref()))
                    .is_some()
            }
            (Purpose::MarkerSearch, TaskOutcome::Geocode(response)) => {
                match (first(response, "address search"), live::<MarkerAttrs>(session, overlays, target.id)) {
                    (Some(result), Some(marker)) => {
                        marker.move_to(platform, result.location);
                        marker.apply_geocode(platform, Some(&result));
                        true
                    }
                    _ => false,
                }
            }
            (Purpose::PathPoint, TaskOutcome::Geocode(response)) => {
                match first(response, "path point lookup") {
                    Some(result) => match target.kind {
                        OverlayKind::Polygon => live::<PolygonAttrs>(session, overlays, target.id)
                            .map(|polygon| polygon.push_point(platform, result.location))
                            .is_some(),
                        OverlayKind::Polyline => live::<PolylineAttrs>(session, overlays, target.id)
                            .map(|polyline| polyline.push_point(platform, result.location))
                            .is_some(),
                        _ => false,
                    },
                    None => false,
                }
            }
            (Purpose::CircleCenter, TaskOutcome::Geocode(response)) => {
                match (first(response, "circle center lookup"), live::<CircleAttrs>(session, overlays, target.id)) {
                    (Some(result), Some(circle)) => {
                        circle.set_center(platform, result.location);
                        true
                    }
                    _ => false,
                }
            }
            (Purpose::GroundCorner(slot), TaskOutcome::Geocode(response)) => {
                match (
                    first(response, "corner lookup"),
                    live::<GroundOverlayAttrs>(session, overlays, target.id),
                ) {
                    (Some(result), Some(overlay)) => {
                        let corner = Corner::new(result.location, result.formatted_address);
                        overlay.set_corner(platform, slot, corner);
                        true
                    }
                    _ => false,
                }
            }
            (Purpose::RouteLocation, TaskOutcome::Geocode(response)) => {
                match (first(response, "route location lookup"), live_route(session, overlays, target.id)) {
                    (Some(result), Some(route)) => {
                        match route.add_location(platform, &self.config.route, Location::from_geocode(&result)) {
                            Ok(()) => {
                                submit_render(route, &mut self.tasks, &self.services);
                                true
                            }
                            Err(err) => {
                                log::warn!("could not add {:?} to {target}: {err}", result.formatted_address);
                                false
                            }
                        }
                    }
                    _ => false,
                }
            }
            (Purpose::RouteMarkerAddress { marker }, TaskOutcome::Geocode(response)) => {
                let result = first(response, "route marker reverse geocode");
                live_route(session, overlays, target.id)
                    .and_then(|route| {
                        let index = route.marker_index(marker)?;
                        route.set_location_address(platform, index, result.as_ref()).ok()
                    })
                    .is_some()
            }
            (Purpose::Directions { seq }, TaskOutcome::Directions(response)) => match response {
                Ok(result) => live_route(session, overlays, target.id)
                    .map(|route| route.apply_directions(platform, seq, result))
                    .unwrap_or(false),
                Err(status) => {
                    log::warn!("directions for {target} failed: {status}");
                    false
                }
            },
            (Purpose::MarkerIcon, TaskOutcome::Asset(Some(url))) => {
                live::<MarkerAttrs>(session, overlays, target.id)
                    .map(|marker| marker.update(platform, |attrs| attrs.icon = Some(url)))
                    .is_some()
            }
            (Purpose::OverlayImage, TaskOutcome::Asset(Some(url))) => {
                live::<GroundOverlayAttrs>(session, overlays, target.id)
                    .map(|overlay| overlay.set_url(platform, url))
                    .is_some()
            }
            (_, TaskOutcome::Asset(None)) => {
                log::debug!("asset picker closed without a choice");
                false
            }
            (purpose, outcome) => {
                log::warn!("unexpected outcome {outcome:?} for {purpose:?}");
                false
            }
        };

        // A lookup that resolved, even unsuccessfully, still re-serializes.
        self.after_change(target)?;
        Ok(applied)
    }

    fn apply_search(&mut self, ticket: Ticket, outcome: TaskOutcome) -> Result<bool> {
        let applied = match (self.session.as_mut(), outcome) {
            (Some(EditingSession::Geocode(search)), TaskOutcome::Geocode(response)) => {
                search.apply_results(ticket.generation, response)
            }
            _ => false,
        };
        if applied {
            self.refresh_session()?;
        }
        Ok(applied)
    }
}

fn find<T>(found: Option<T>, reference: OverlayRef) -> Result<T> {
    found.ok_or_else(|| MapError::UnknownOverlay(reference.to_string()).into())
}

/// First geocode result, logging a failed lookup.
fn first(response: crate::platform::GeocodeResponse, what: &str) -> Option<GeocodeResult> {
    match response {
        Ok(results) => results.into_iter().next(),
        Err(status) => {
            log::info!("{what} failed: {status}");
            None
        }
    }
}

/// The overlay `id` of kind `A`, in the session draft or the collection.
fn live<'a, A: SessionKind>(
    session: &'a mut Option<EditingSession>,
    overlays: &'a mut Collections,
    id: HandleId,
) -> Option<&'a mut Overlay<A>> {
    if let Some(draft) = session
        .as_mut()
        .and_then(A::unwrap_mut)
        .and_then(OverlaySession::draft_mut)
    {
        if draft.id() == id {
            return Some(draft);
        }
    }
    A::find_mut(overlays, id)
}

fn live_route<'a>(
    session: &'a mut Option<EditingSession>,
    overlays: &'a mut Collections,
    id: HandleId,
) -> Option<&'a mut Route> {
    if let Some(EditingSession::Route(open)) = session.as_mut() {
        if let Some(draft) = open.draft_mut() {
            if draft.id() == id {
                return Some(draft);
            }
        }
    }
    Route::find_mut(overlays, id)
}
