//! Route editing: locations, their lettered markers and directions options.

use super::{changed_keys, SessionContext, SessionCore, SessionForm, SessionState};
use crate::{
    background::{Purpose, SessionToken, TaskQueue, Ticket},
    core::{
        config::MapFieldConfig,
        geo::{LatLng, PointInput},
    },
    layers::{
        base::{Content, OverlayKind, OverlayRef},
        manager::{CollectionMember, Collections},
        route::{Location, Route, RouteMarker, RouteOptions, RouteSnapshot},
    },
    platform::{GeocodeRequest, HandleId, Interaction, MappingPlatform, Services, TravelMode},
    traits::OverlayOperations,
    MapError, Result,
};

/// Ask the directions service for a fresh path when the route has two or
/// more locations. Returns whether a request went out.
///
/// Directions are not tied to a session: the render sequence already makes
/// every earlier request stale, and a committed route must still draw once
/// the answer arrives.
pub(crate) fn submit_render(route: &mut Route, tasks: &mut TaskQueue, services: &Services) -> bool {
    let Some((seq, request)) = route.render(None) else {
        return false;
    };
    let ticket = Ticket::new(
        Purpose::Directions { seq },
        OverlayRef::new(OverlayKind::Route, route.id()),
        route.base().generation(),
    );
    tasks.directions(ticket, services.directions.clone(), request);
    true
}

/// Move stop `index`, look up the address of its new position and re-render.
pub(crate) fn move_stop(
    route: &mut Route,
    index: usize,
    position: LatLng,
    tasks: &mut TaskQueue,
    services: &Services,
    session: Option<SessionToken>,
) -> Result<()> {
    route.move_location(services.platform.as_ref(), index, position)?;
    let marker = route.markers()[index].id();
    let ticket = Ticket::new(
        Purpose::RouteMarkerAddress { marker },
        OverlayRef::new(OverlayKind::Route, route.id()),
        route.base().generation(),
    )
    .in_session(session);
    tasks.geocode(ticket, services.geocoder.clone(), GeocodeRequest::Location(position));
    submit_render(route, tasks, services);
    Ok(())
}

pub enum RouteTarget {
    Draft(Route),
    Saved { id: HandleId, snapshot: RouteSnapshot },
}

pub struct RouteSession {
    core: SessionCore,
    target: RouteTarget,
    /// Markers that existed when the session opened and were removed since
    removed: Vec<RouteMarker>,
}

impl RouteSession {
    pub(crate) fn open_draft(mut core: SessionCore, mut route: Route, platform: &dyn MappingPlatform) -> Self {
        route.set_interaction(platform, Interaction::editing());
        core.begin_editing();
        Self {
            core,
            target: RouteTarget::Draft(route),
            removed: Vec::new(),
        }
    }

    pub(crate) fn open_saved(mut core: SessionCore, route: &mut Route, platform: &dyn MappingPlatform) -> Self {
        let snapshot = route.snapshot();
        route.base_mut().close_popup(platform);
        route.set_interaction(platform, Interaction::editing());
        route.base().model().drain_changes();
        core.begin_editing();
        Self {
            core,
            target: RouteTarget::Saved {
                id: route.id(),
                snapshot,
            },
            removed: Vec::new(),
        }
    }

    pub fn core(&self) -> &SessionCore {
        &self.core
    }

    pub fn is_new(&self) -> bool {
        matches!(self.target, RouteTarget::Draft(_))
    }

    pub fn target_id(&self) -> HandleId {
        match &self.target {
            RouteTarget::Draft(route) => route.id(),
            RouteTarget::Saved { id, .. } => *id,
        }
    }

    pub fn draft(&self) -> Option<&Route> {
        match &self.target {
            RouteTarget::Draft(route) => Some(route),
            RouteTarget::Saved { .. } => None,
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut Route> {
        match &mut self.target {
            RouteTarget::Draft(route) => Some(route),
            RouteTarget::Saved { .. } => None,
        }
    }

    pub(crate) fn commit(self, cx: &mut SessionContext<'_>) -> Result<OverlayRef> {
        let RouteSession {
            mut core,
            target,
            removed,
        } = self;
        let platform = cx.services.platform.as_ref();
        for marker in removed {
            marker.discard(platform);
        }

        let reference = match target {
            RouteTarget::Draft(mut route) => {
                finish_editing(&mut route, cx.services);
                cx.overlays.push(route)
            }
            RouteTarget::Saved { id, .. } => {
                let route = find_route(cx.overlays, id)?;
                finish_editing(route, cx.services);
                OverlayRef::new(OverlayKind::Route, id)
            }
        };
        core.finish(SessionState::Committed);
        log::debug!("committed {reference}");
        Ok(reference)
    }

    pub(crate) fn cancel(self, cx: &mut SessionContext<'_>) -> Result<()> {
        let RouteSession {
            mut core,
            target,
            removed,
        } = self;
        let platform = cx.services.platform.as_ref();
        match target {
            RouteTarget::Draft(mut route) => {
                log::debug!("discarding unsaved route {}", route.id());
                OverlayOperations::discard(&mut route, platform);
                for marker in removed {
                    marker.discard(platform);
                }
            }
            RouteTarget::Saved { id, snapshot } => {
                let route = find_route(cx.overlays, id)?;
                route.revert(platform, &cx.config.route, snapshot, removed);
                route.set_interaction(platform, Interaction::frozen());
                route.forget_snapshots();
                route.base().model().drain_changes();
                submit_render(route, cx.tasks, cx.services);
            }
        }
        core.finish(SessionState::Cancelled);
        Ok(())
    }
}

fn find_route(overlays: &mut Collections, id: HandleId) -> Result<&mut Route> {
    Route::find_mut(overlays, id)
        .ok_or_else(|| MapError::UnknownOverlay(format!("route {id}")).into())
}

fn finish_editing(route: &mut Route, services: &Services) {
    let platform = services.platform.as_ref();
    route.set_interaction(platform, Interaction::frozen());
    route.mark_saved();
    route.forget_snapshots();
    if let Err(err) = OverlayOperations::build_info_content(route, services.templates.as_ref()) {
        log::warn!("could not build popup for route {}: {}", route.id(), err);
    }
    route.base().model().drain_changes();
}

struct RouteParts<'s> {
    route: &'s mut Route,
    snapshot: Option<&'s RouteSnapshot>,
    removed: &'s mut Vec<RouteMarker>,
    services: &'s Services,
    tasks: &'s mut TaskQueue,
    config: &'s MapFieldConfig,
    token: SessionToken,
}

impl<'s> RouteParts<'s> {
    fn platform(&self) -> &'s dyn MappingPlatform {
        self.services.platform.as_ref()
    }

    fn geocode(&mut self, purpose: Purpose, request: GeocodeRequest) {
        let ticket = Ticket::new(
            purpose,
            OverlayRef::new(OverlayKind::Route, self.route.id()),
            self.route.base().generation(),
        )
        .in_session(Some(self.token));
        self.tasks
            .geocode(ticket, self.services.geocoder.clone(), request);
    }

    fn render(&mut self) -> bool {
        submit_render(self.route, self.tasks, self.services)
    }
}

impl<'a> SessionForm<'a, RouteSession> {
    fn parts(&mut self) -> Result<RouteParts<'_>> {
        let token = self.session.core.token();
        let (route, snapshot) = match &mut self.session.target {
            RouteTarget::Draft(route) => (route, None),
            RouteTarget::Saved { id, snapshot } => {
                (find_route(&mut *self.cx.overlays, *id)?, Some(&*snapshot))
            }
        };
        Ok(RouteParts {
            route,
            snapshot,
            removed: &mut self.session.removed,
            services: self.cx.services,
            tasks: &mut *self.cx.tasks,
            config: self.cx.config,
            token,
        })
    }

    pub fn route(&self) -> Result<&Route> {
        match &self.session.target {
            RouteTarget::Draft(route) => Ok(route),
            RouteTarget::Saved { id, .. } => Route::find(&*self.cx.overlays, *id)
                .ok_or_else(|| MapError::UnknownOverlay(format!("route {id}")).into()),
        }
    }

    pub fn token(&self) -> SessionToken {
        self.session.core.token()
    }

    /// Add a stop. Coordinates are placed at once and their address looked
    /// up afterwards; text is geocoded first and placed once resolved.
    pub fn add_location(&mut self, input: impl Into<PointInput>) -> Result<()> {
        let mut parts = self.parts()?;
        let max = parts.config.route.max_locations;
        if parts.route.locations().len() >= max {
            return Err(MapError::RouteFull { max }.into());
        }

        match input.into() {
            PointInput::Coordinate(position) => {
                let platform = parts.platform();
                parts
                    .route
                    .add_location(platform, &parts.config.route, Location::new(position, ""))?;
                if let Some(marker) = parts.route.markers().last().map(RouteMarker::id) {
                    parts.geocode(
                        Purpose::RouteMarkerAddress { marker },
                        GeocodeRequest::Location(position),
                    );
                }
                parts.render();
            }
            PointInput::Address(text) => {
                parts.geocode(Purpose::RouteLocation, GeocodeRequest::Address(text));
            }
        }
        Ok(())
    }

    /// Remove a stop; the route is re-rendered from what remains.
    pub fn remove_location(&mut self, index: usize) -> Result<Location> {
        let mut parts = self.parts()?;
        let platform = parts.platform();
        let location = parts
            .route
            .locations()
            .get(index)
            .cloned()
            .ok_or(MapError::IndexOutOfBounds {
                index,
                len: parts.route.locations().len(),
            })?;
        let marker = parts
            .route
            .remove_location(platform, &parts.config.route, index)?;
        if parts.snapshot.is_some_and(|snapshot| snapshot.contains_marker(marker.id())) {
            parts.removed.push(marker);
        } else {
            marker.discard(platform);
        }
        parts.render();
        Ok(location)
    }

    /// Move a stop, e.g. after its marker was dragged.
    pub fn move_location(&mut self, index: usize, position: LatLng) -> Result<()> {
        let parts = self.parts()?;
        move_stop(
            parts.route,
            index,
            position,
            parts.tasks,
            parts.services,
            Some(parts.token),
        )
    }

    pub fn set_options(&mut self, options: RouteOptions) -> Result<Vec<String>> {
        let mut parts = self.parts()?;
        let changed = parts.route.set_options(options);
        if !changed.is_empty() {
            parts.render();
        }
        Ok(changed)
    }

    pub fn set_travel_mode(&mut self, travel_mode: TravelMode) -> Result<Vec<String>> {
        let options = RouteOptions {
            travel_mode,
            ..self.route()?.options()
        };
        self.set_options(options)
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<Vec<String>> {
        let title = title.into();
        let mut parts = self.parts()?;
        Ok(parts
            .route
            .base_mut()
            .write_back(|attrs| attrs.common.title = title))
    }

    pub fn set_content(&mut self, text: impl Into<String>) -> Result<Vec<String>> {
        let text = text.into();
        let mut parts = self.parts()?;
        Ok(parts.route.base_mut().write_back(|attrs| {
            attrs.common.custom_content = !text.is_empty();
            attrs.common.content = Content::Text(text);
        }))
    }

    pub fn changed_keys(&mut self) -> Result<Vec<String>> {
        let parts = self.parts()?;
        Ok(changed_keys(parts.route.base().model().drain_changes()))
    }

    pub fn render(&mut self) -> Result<String> {
        let template = self.cx.config.templates.session_form.clone();
        let route = self.route()?;
        let data = serde_json::json!({
            "kind": OverlayKind::Route,
            "session": self.token().0,
            "isNew": route.is_new(),
            "attrs": serde_json::to_value(route.attrs())?,
            "canAddLocation": route.locations().len() < self.cx.config.route.max_locations,
        });
        self.cx.services.templates.render(&template, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        background::TaskOutcome,
        layers::route::{RouteAttrs, RouteState},
        platform::HeadlessPlatform,
    };
    use std::sync::Arc;

    struct Fixture {
        platform: Arc<HeadlessPlatform>,
        services: Services,
        overlays: Collections,
        tasks: TaskQueue,
        config: MapFieldConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let platform = Arc::new(HeadlessPlatform::new());
            Self {
                services: Services::headless(platform.clone()),
                platform,
                overlays: Collections::new(),
                tasks: TaskQueue::new(),
                config: MapFieldConfig::default(),
            }
        }

        fn cx(&mut self) -> SessionContext<'_> {
            SessionContext {
                overlays: &mut self.overlays,
                services: &self.services,
                tasks: &mut self.tasks,
                config: &self.config,
            }
        }

        fn saved_route(&mut self, stops: &[(f64, f64)]) -> HandleId {
            let attrs = RouteAttrs {
                locations: stops
                    .iter()
                    .map(|&(lat, lng)| Location::new(LatLng::new(lat, lng), ""))
                    .collect(),
                ..Default::default()
            };
            let route = Route::create(attrs, self.platform.as_ref(), &self.config.route);
            let id = route.id();
            self.overlays.routes.push(route);
            id
        }
    }

    fn core(token: u64) -> SessionCore {
        SessionCore::new(SessionToken(token), false)
    }

    #[test]
    fn test_two_locations_request_directions() {
        let mut fx = Fixture::new();
        let draft = Route::draft(RouteOptions::default(), fx.platform.as_ref(), &fx.config.route);
        let mut session = RouteSession::open_draft(core(1), draft, fx.platform.as_ref());
        {
            let mut form = SessionForm::new(&mut session, fx.cx());
            form.add_location(LatLng::new(0.0, 0.0)).unwrap();
            assert_eq!(form.route().unwrap().state(), RouteState::Partial);
            form.add_location("1,1").unwrap();
            assert_eq!(form.route().unwrap().state(), RouteState::Routed);
        }
        assert_eq!(fx.platform.directions_requests().len(), 1);

        let directions: Vec<_> = fx
            .tasks
            .poll_ready()
            .into_iter()
            .filter(|task| matches!(task.outcome, TaskOutcome::Directions(_)))
            .collect();
        assert_eq!(directions.len(), 1);
        assert_eq!(directions[0].ticket.purpose, Purpose::Directions { seq: 1 });
        assert_eq!(directions[0].ticket.session, None);
    }

    #[test]
    fn test_route_full() {
        let mut fx = Fixture::new();
        fx.config.route.max_locations = 2;
        let draft = Route::draft(RouteOptions::default(), fx.platform.as_ref(), &fx.config.route);
        let mut session = RouteSession::open_draft(core(2), draft, fx.platform.as_ref());
        let mut form = SessionForm::new(&mut session, fx.cx());
        form.add_location(LatLng::new(0.0, 0.0)).unwrap();
        form.add_location(LatLng::new(1.0, 0.0)).unwrap();
        let err = form.add_location("Bergen").unwrap_err();
        assert!(err.to_string().contains('2'));
    }

    #[test]
    fn test_cancel_restores_removed_marker() {
        let mut fx = Fixture::new();
        let id = fx.saved_route(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        let original: Vec<HandleId> = fx.overlays.routes[0].markers().iter().map(RouteMarker::id).collect();

        let route = Route::find_mut(&mut fx.overlays, id).unwrap();
        let mut session = RouteSession::open_saved(core(3), route, fx.platform.as_ref());
        {
            let mut form = SessionForm::new(&mut session, fx.cx());
            form.remove_location(1).unwrap();
            form.add_location(LatLng::new(5.0, 5.0)).unwrap();
            assert_eq!(form.route().unwrap().markers().len(), 3);
        }
        let added = fx.overlays.routes[0].markers()[2].id();

        session.cancel(&mut fx.cx()).unwrap();
        let route = &fx.overlays.routes[0];
        let restored: Vec<HandleId> = route.markers().iter().map(RouteMarker::id).collect();
        assert_eq!(restored, original);
        assert_eq!(route.locations().len(), 3);
        assert!(fx.platform.handle(original[1]).unwrap().attached);
        assert!(fx.platform.handle(added).unwrap().discarded);
    }

    #[test]
    fn test_commit_discards_removed_markers() {
        let mut fx = Fixture::new();
        let id = fx.saved_route(&[(0.0, 0.0), (1.0, 1.0)]);
        let route = Route::find_mut(&mut fx.overlays, id).unwrap();
        let mut session = RouteSession::open_saved(core(4), route, fx.platform.as_ref());
        let removed = {
            let mut form = SessionForm::new(&mut session, fx.cx());
            let marker = form.route().unwrap().markers()[0].id();
            form.remove_location(0).unwrap();
            assert!(form.route().unwrap().path().is_empty());
            marker
        };

        session.commit(&mut fx.cx()).unwrap();
        assert_eq!(fx.overlays.routes[0].locations().len(), 1);
        assert!(fx.platform.handle(removed).unwrap().discarded);
    }
}
