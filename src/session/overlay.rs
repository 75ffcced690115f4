//! Sessions over single-handle overlays: markers, circles, polygons,
//! polylines and ground overlays.

use super::{changed_keys, EditingSession, SessionContext, SessionCore, SessionForm, SessionState};
use crate::{
    background::{Purpose, SessionToken, TaskQueue, Ticket},
    core::{
        config::MapFieldConfig,
        geo::{LatLng, PointInput},
    },
    layers::{
        base::{Content, Overlay, OverlayAttributes, OverlayRef},
        circle::{CircleAttrs, Metric},
        image::{Corner, CornerSlot, GroundOverlayAttrs},
        manager::{CollectionMember, Collections},
        marker::MarkerAttrs,
        polygon::{PolygonAttrs, PolylineAttrs},
    },
    platform::{AssetKind, GeocodeRequest, HandleId, Interaction, MappingPlatform, Services},
    traits::HasPath,
    MapError, Result,
};

/// Overlay kinds edited through an [`OverlaySession`].
pub trait SessionKind: OverlayAttributes {
    fn wrap(session: OverlaySession<Self>) -> EditingSession;

    fn unwrap_mut(session: &mut EditingSession) -> Option<&mut OverlaySession<Self>>;

    fn collection_mut(overlays: &mut Collections) -> &mut Vec<Overlay<Self>>;

    fn collection(overlays: &Collections) -> &Vec<Overlay<Self>>;

    /// Runs once the session is open and the form is usable.
    fn on_open(form: &mut SessionForm<'_, OverlaySession<Self>>) -> Result<()>;

    fn find(overlays: &Collections, id: HandleId) -> Option<&Overlay<Self>> {
        Self::collection(overlays).iter().find(|overlay| overlay.id() == id)
    }

    fn find_mut(overlays: &mut Collections, id: HandleId) -> Option<&mut Overlay<Self>> {
        Self::collection_mut(overlays)
            .iter_mut()
            .find(|overlay| overlay.id() == id)
    }
}

macro_rules! session_kind {
    ($attrs:ty, $variant:ident) => {
        session_kind!($attrs, $variant, |_form| Ok(()));
    };
    ($attrs:ty, $variant:ident, $on_open:expr) => {
        impl SessionKind for $attrs {
            fn wrap(session: OverlaySession<Self>) -> EditingSession {
                EditingSession::$variant(session)
            }

            fn unwrap_mut(session: &mut EditingSession) -> Option<&mut OverlaySession<Self>> {
                match session {
                    EditingSession::$variant(session) => Some(session),
                    _ => None,
                }
            }

            fn collection_mut(overlays: &mut Collections) -> &mut Vec<Overlay<Self>> {
                <Overlay<Self> as CollectionMember>::collection_mut(overlays)
            }

            fn collection(overlays: &Collections) -> &Vec<Overlay<Self>> {
                <Overlay<Self> as CollectionMember>::collection(overlays)
            }

            fn on_open(form: &mut SessionForm<'_, OverlaySession<Self>>) -> Result<()> {
                ($on_open)(form)
            }
        }
    };
}

session_kind!(MarkerAttrs, Marker, |form: &mut SessionForm<'_, MarkerSession>| form
    .sync_address());
session_kind!(CircleAttrs, Circle);
session_kind!(PolygonAttrs, Polygon);
session_kind!(PolylineAttrs, Polyline);
session_kind!(GroundOverlayAttrs, GroundOverlay);

/// The overlay a session edits.
pub enum Target<A> {
    /// Created by an "Add" action; lives in the session until committed
    Draft(Overlay<A>),
    /// Lives in its collection; `snapshot` is what cancel restores
    Saved { id: HandleId, snapshot: A },
}

pub struct OverlaySession<A> {
    core: SessionCore,
    target: Target<A>,
}

pub type MarkerSession = OverlaySession<MarkerAttrs>;
pub type CircleSession = OverlaySession<CircleAttrs>;
pub type PolygonSession = OverlaySession<PolygonAttrs>;
pub type PolylineSession = OverlaySession<PolylineAttrs>;
pub type GroundOverlaySession = OverlaySession<GroundOverlayAttrs>;

impl<A: SessionKind> OverlaySession<A> {
    pub(crate) fn open_draft(
        mut core: SessionCore,
        mut overlay: Overlay<A>,
        platform: &dyn MappingPlatform,
    ) -> Self {
        overlay.set_interaction(platform, Interaction::editing());
        core.begin_editing();
        Self {
            core,
            target: Target::Draft(overlay),
        }
    }

    pub(crate) fn open_saved(
        mut core: SessionCore,
        overlay: &mut Overlay<A>,
        platform: &dyn MappingPlatform,
    ) -> Self {
        let snapshot = overlay.attrs().clone();
        overlay.close_popup(platform);
        overlay.set_interaction(platform, Interaction::editing());
        // Changes made before the session opened are not this form's business
        overlay.model().drain_changes();
        core.begin_editing();
        Self {
            core,
            target: Target::Saved {
                id: overlay.id(),
                snapshot,
            },
        }
    }

    pub fn core(&self) -> &SessionCore {
        &self.core
    }

    pub fn is_new(&self) -> bool {
        matches!(self.target, Target::Draft(_))
    }

    pub fn target_id(&self) -> HandleId {
        match &self.target {
            Target::Draft(overlay) => overlay.id(),
            Target::Saved { id, .. } => *id,
        }
    }

    pub fn draft(&self) -> Option<&Overlay<A>> {
        match &self.target {
            Target::Draft(overlay) => Some(overlay),
            Target::Saved { .. } => None,
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut Overlay<A>> {
        match &mut self.target {
            Target::Draft(overlay) => Some(overlay),
            Target::Saved { .. } => None,
        }
    }

    pub(crate) fn commit(self, cx: &mut SessionContext<'_>) -> Result<OverlayRef> {
        let OverlaySession { mut core, target } = self;
        let reference = match target {
            Target::Draft(mut overlay) => {
                finish_editing(&mut overlay, cx.services);
                overlay.mark_saved();
                let reference = OverlayRef::new(A::KIND, overlay.id());
                A::collection_mut(cx.overlays).push(overlay);
                reference
            }
            Target::Saved { id, .. } => {
                let overlay = A::find_mut(cx.overlays, id)
                    .ok_or_else(|| MapError::UnknownOverlay(format!("{} {id}", A::KIND)))?;
                finish_editing(overlay, cx.services);
                OverlayRef::new(A::KIND, id)
            }
        };
        core.finish(SessionState::Committed);
        log::debug!("committed {reference}");
        Ok(reference)
    }

    pub(crate) fn cancel(self, cx: &mut SessionContext<'_>) -> Result<()> {
        let OverlaySession { mut core, target } = self;
        let platform = cx.services.platform.as_ref();
        match target {
            Target::Draft(mut overlay) => {
                log::debug!("discarding unsaved {} {}", A::KIND, overlay.id());
                overlay.discard(platform);
            }
            Target::Saved { id, snapshot } => {
                if let Some(overlay) = A::find_mut(cx.overlays, id) {
                    overlay.reset(platform, snapshot);
                    overlay.set_interaction(platform, Interaction::frozen());
                    overlay.model().drain_changes();
                }
            }
        }
        core.finish(SessionState::Cancelled);
        Ok(())
    }
}

fn finish_editing<A: OverlayAttributes>(overlay: &mut Overlay<A>, services: &Services) {
    let platform = services.platform.as_ref();
    overlay.set_interaction(platform, Interaction::frozen());
    if let Err(err) = overlay.build_info_content(services.templates.as_ref()) {
        log::warn!("could not build popup for {} {}: {}", A::KIND, overlay.id(), err);
    }
    overlay.model().drain_changes();
}

/// Mutable view of the edited overlay plus what operations need around it.
pub(crate) struct Parts<'s, A> {
    pub overlay: &'s mut Overlay<A>,
    pub services: &'s Services,
    pub tasks: &'s mut TaskQueue,
    pub config: &'s MapFieldConfig,
    pub token: SessionToken,
}

impl<'s, A: SessionKind> Parts<'s, A> {
    pub fn platform(&self) -> &'s dyn MappingPlatform {
        self.services.platform.as_ref()
    }

    pub fn ticket(&self, purpose: Purpose) -> Ticket {
        Ticket::new(
            purpose,
            OverlayRef::new(A::KIND, self.overlay.id()),
            self.overlay.generation(),
        )
        .in_session(Some(self.token))
    }

    pub fn geocode(&mut self, purpose: Purpose, request: GeocodeRequest) {
        let ticket = self.ticket(purpose);
        self.tasks
            .geocode(ticket, self.services.geocoder.clone(), request);
    }

    pub fn pick_asset(&mut self, purpose: Purpose, kind: AssetKind) {
        let ticket = self.ticket(purpose);
        self.tasks
            .pick_asset(ticket, self.services.assets.clone(), kind);
    }
}

impl<'a, A: SessionKind> SessionForm<'a, OverlaySession<A>> {
    pub(crate) fn parts(&mut self) -> Result<Parts<'_, A>> {
        let token = self.session.core.token();
        let overlay = match &mut self.session.target {
            Target::Draft(overlay) => overlay,
            Target::Saved { id, .. } => A::find_mut(&mut *self.cx.overlays, *id)
                .ok_or_else(|| MapError::UnknownOverlay(format!("{} {id}", A::KIND)))?,
        };
        Ok(Parts {
            overlay,
            services: self.cx.services,
            tasks: &mut *self.cx.tasks,
            config: self.cx.config,
            token,
        })
    }

    pub fn overlay(&self) -> Result<&Overlay<A>> {
        match &self.session.target {
            Target::Draft(overlay) => Ok(overlay),
            Target::Saved { id, .. } => A::find(&*self.cx.overlays, *id)
                .ok_or_else(|| MapError::UnknownOverlay(format!("{} {id}", A::KIND)).into()),
        }
    }

    pub fn attrs(&self) -> Result<A> {
        Ok(self.overlay()?.attrs().clone())
    }

    pub fn token(&self) -> SessionToken {
        self.session.core.token()
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<Vec<String>> {
        let title = title.into();
        let mut parts = self.parts()?;
        let platform = parts.platform();
        Ok(parts
            .overlay
            .update(platform, |attrs| attrs.common_mut().title = title))
    }

    /// Author-written popup content; address lookups no longer replace it.
    pub fn set_content(&mut self, text: impl Into<String>) -> Result<Vec<String>> {
        let text = text.into();
        let mut parts = self.parts()?;
        let platform = parts.platform();
        Ok(parts.overlay.update(platform, |attrs| {
            let common = attrs.common_mut();
            common.custom_content = !text.is_empty();
            common.content = Content::Text(text);
        }))
    }

    /// String-keyed form binding, e.g. `("fillOpacity", 0.5)`.
    pub fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<Vec<String>> {
        let mut parts = self.parts()?;
        let platform = parts.platform();
        parts.overlay.set_value(platform, key, value)
    }

    /// Keys changed since the last call, including by asynchronous results.
    pub fn changed_keys(&mut self) -> Result<Vec<String>> {
        let parts = self.parts()?;
        Ok(changed_keys(parts.overlay.model().drain_changes()))
    }

    pub fn render(&mut self) -> Result<String> {
        let is_new = self.session.is_new();
        let token = self.token();
        let template = self.cx.config.templates.session_form.clone();
        let attrs = serde_json::to_value(self.overlay()?.attrs())?;
        let data = serde_json::json!({
            "kind": A::KIND,
            "session": token.0,
            "isNew": is_new,
            "attrs": attrs,
        });
        self.cx.services.templates.render(&template, &data)
    }
}

impl<'a> SessionForm<'a, MarkerSession> {
    /// Move the marker and look up the address of its new position.
    pub fn set_position(&mut self, position: LatLng) -> Result<()> {
        if !position.is_valid() {
            return Err(MapError::InvalidCoordinates {
                lat: position.lat,
                lng: position.lng,
            }
            .into());
        }
        let mut parts = self.parts()?;
        let platform = parts.platform();
        parts.overlay.move_to(platform, position);
        parts.geocode(Purpose::MarkerAddress, GeocodeRequest::Location(position));
        Ok(())
    }

    /// Coordinates move the marker directly; text is geocoded first.
    pub fn set_address(&mut self, input: impl Into<PointInput>) -> Result<()> {
        match input.into() {
            PointInput::Coordinate(position) => self.set_position(position),
            PointInput::Address(text) => {
                let mut parts = self.parts()?;
                parts.geocode(Purpose::MarkerSearch, GeocodeRequest::Address(text));
                Ok(())
            }
        }
    }

    /// Reverse geocode a saved marker that has no address yet.
    pub(crate) fn sync_address(&mut self) -> Result<()> {
        let mut parts = self.parts()?;
        let attrs = parts.overlay.attrs();
        if !attrs.address.is_empty() || parts.overlay.is_new() {
            return Ok(());
        }
        let position = attrs.position();
        parts.geocode(Purpose::MarkerAddress, GeocodeRequest::Location(position));
        Ok(())
    }

    /// Let the host's asset picker choose an icon.
    pub fn choose_icon(&mut self) -> Result<()> {
        self.parts()?.pick_asset(Purpose::MarkerIcon, AssetKind::MarkerIcon);
        Ok(())
    }

    pub fn set_icon(&mut self, icon: Option<String>) -> Result<Vec<String>> {
        let mut parts = self.parts()?;
        let platform = parts.platform();
        Ok(parts.overlay.update(platform, |attrs| attrs.icon = icon))
    }

    pub fn set_draggable(&mut self, draggable: bool) -> Result<Vec<String>> {
        let mut parts = self.parts()?;
        let platform = parts.platform();
        Ok(parts.overlay.update(platform, |attrs| attrs.draggable = draggable))
    }

    pub fn set_scaled_size(&mut self, size: Option<(f64, f64)>) -> Result<Vec<String>> {
        let mut parts = self.parts()?;
        let platform = parts.platform();
        Ok(parts.overlay.update(platform, |attrs| {
            attrs.scaled_width = size.map(|(width, _)| width);
            attrs.scaled_height = size.map(|(_, height)| height);
        }))
    }
}

impl<'a> SessionForm<'a, CircleSession> {
    pub fn set_center(&mut self, input: impl Into<PointInput>) -> Result<()> {
        let mut parts = self.parts()?;
        match input.into() {
            PointInput::Coordinate(center) => {
                if !center.is_valid() {
                    return Err(MapError::InvalidCoordinates {
                        lat: center.lat,
                        lng: center.lng,
                    }
                    .into());
                }
                let platform = parts.platform();
                parts.overlay.set_center(platform, center);
            }
            PointInput::Address(text) => {
                parts.geocode(Purpose::CircleCenter, GeocodeRequest::Address(text));
            }
        }
        Ok(())
    }

    pub fn set_radius(&mut self, radius: f64) -> Result<Vec<String>> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(MapError::InvalidRadius(radius).into());
        }
        let mut parts = self.parts()?;
        let platform = parts.platform();
        Ok(parts.overlay.set_radius(platform, radius))
    }

    pub fn set_metric(&mut self, metric: Metric) -> Result<Vec<String>> {
        let mut parts = self.parts()?;
        let platform = parts.platform();
        Ok(parts.overlay.set_metric(platform, metric))
    }
}

impl<'a, A> SessionForm<'a, OverlaySession<A>>
where
    A: SessionKind + HasPath,
{
    /// Append a point; free text is geocoded and appended once resolved.
    pub fn add_point(&mut self, input: impl Into<PointInput>) -> Result<()> {
        let mut parts = self.parts()?;
        match input.into() {
            PointInput::Coordinate(point) => {
                let platform = parts.platform();
                parts.overlay.push_point(platform, point);
            }
            PointInput::Address(text) => {
                parts.geocode(Purpose::PathPoint, GeocodeRequest::Address(text));
            }
        }
        Ok(())
    }

    pub fn remove_point(&mut self, index: usize) -> Result<LatLng> {
        let mut parts = self.parts()?;
        let platform = parts.platform();
        parts.overlay.remove_point(platform, index)
    }
}

impl<'a> SessionForm<'a, GroundOverlaySession> {
    pub fn set_corner(&mut self, slot: CornerSlot, input: impl Into<PointInput>) -> Result<()> {
        let mut parts = self.parts()?;
        match input.into() {
            PointInput::Coordinate(position) => {
                let platform = parts.platform();
                parts
                    .overlay
                    .set_corner(platform, slot, Corner::new(position, ""));
            }
            PointInput::Address(text) => {
                parts.geocode(Purpose::GroundCorner(slot), GeocodeRequest::Address(text));
            }
        }
        Ok(())
    }

    pub fn set_url(&mut self, url: impl Into<String>) -> Result<Vec<String>> {
        let mut parts = self.parts()?;
        let platform = parts.platform();
        Ok(parts.overlay.set_url(platform, url))
    }

    /// Let the host's asset picker choose the image.
    pub fn choose_image(&mut self) -> Result<()> {
        self.parts()?
            .pick_asset(Purpose::OverlayImage, AssetKind::OverlayImage);
        Ok(())
    }

    pub fn set_opacity(&mut self, opacity: f64) -> Result<Vec<String>> {
        let mut parts = self.parts()?;
        let platform = parts.platform();
        Ok(parts.overlay.set_opacity(platform, opacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::geo::LatLng,
        platform::{HeadlessPlatform, Primitive},
        traits::OverlayOperations,
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
    }

    fn core(token: u64) -> SessionCore {
        SessionCore::new(SessionToken(token), false)
    }

    #[test]
    fn test_commit_registers_draft() {
        let mut fx = Fixture::new();
        let draft = Overlay::draft(CircleAttrs::default(), fx.platform.as_ref());
        let mut session = CircleSession::open_draft(core(1), draft, fx.platform.as_ref());
        assert_eq!(session.core().state(), SessionState::Editing);
        assert!(fx.platform.handle(session.target_id()).unwrap().interaction.editable);

        {
            let mut form = SessionForm::new(&mut session, fx.cx());
            form.set_center(LatLng::new(5.0, 6.0)).unwrap();
            form.set_radius(3.0).unwrap();
        }

        let reference = session.commit(&mut fx.cx()).unwrap();
        let circle = &fx.overlays.circles[0];
        assert_eq!(circle.id(), reference.id);
        assert!(circle.is_saved_to_map());
        assert!(!circle.is_new());
        assert_eq!(circle.attrs().radius, 3.0);
        assert!(!fx.platform.handle(circle.id()).unwrap().interaction.editable);
        assert!(circle.popup().markup().is_some());
    }

    #[test]
    fn test_circle_rejects_invalid_input() {
        let mut fx = Fixture::new();
        let draft = Overlay::draft(CircleAttrs::default(), fx.platform.as_ref());
        let mut session = CircleSession::open_draft(core(6), draft, fx.platform.as_ref());
        let mut form = SessionForm::new(&mut session, fx.cx());

        let err = form.set_center(LatLng::new(95.0, 10.0)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MapError>(),
            Some(MapError::InvalidCoordinates { .. })
        ));
        for radius in [-1.0, f64::NAN, f64::INFINITY] {
            let err = form.set_radius(radius).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<MapError>(),
                Some(MapError::InvalidRadius(_))
            ));
        }

        let attrs = form.attrs().unwrap();
        assert_eq!((attrs.lat, attrs.lng), (0.0, 0.0));
        assert_eq!(attrs.radius, CircleAttrs::default().radius);
    }

    #[test]
    fn test_cancel_restores_saved() {
        let mut fx = Fixture::new();
        let saved = Overlay::create(
            CircleAttrs {
                radius: 100.0,
                metric: Metric::Miles,
                ..Default::default()
            },
            fx.platform.as_ref(),
        );
        let id = saved.id();
        fx.overlays.circles.push(saved);

        let overlay = CircleAttrs::find_mut(&mut fx.overlays, id).unwrap();
        let mut session = CircleSession::open_saved(core(2), overlay, fx.platform.as_ref());
        {
            let mut form = SessionForm::new(&mut session, fx.cx());
            form.set_radius(500.0).unwrap();
            form.set_metric(Metric::Kilometers).unwrap();
            assert_eq!(form.changed_keys().unwrap(), vec!["metric", "radius"]);
        }

        session.cancel(&mut fx.cx()).unwrap();
        let circle = &fx.overlays.circles[0];
        assert_eq!(circle.attrs().radius, 100.0);
        assert_eq!(circle.attrs().metric, Metric::Miles);
        match fx.platform.handle(id).unwrap().primitive {
            Primitive::Circle { radius_meters, .. } => {
                assert_eq!(radius_meters, Metric::Miles.to_meters(100.0))
            }
            other => panic!("unexpected primitive {other:?}"),
        }
    }

    #[test]
    fn test_cancel_discards_draft() {
        let mut fx = Fixture::new();
        let draft = Overlay::draft(PolygonAttrs::default(), fx.platform.as_ref());
        let mut session = PolygonSession::open_draft(core(3), draft, fx.platform.as_ref());
        {
            let mut form = SessionForm::new(&mut session, fx.cx());
            form.add_point(LatLng::new(0.0, 0.0)).unwrap();
            form.add_point("1,1").unwrap();
            form.add_point(LatLng::new(0.0, 1.0)).unwrap();
            assert_eq!(form.overlay().unwrap().points().len(), 3);
            assert!(form.remove_point(7).is_err());
        }
        let id = session.target_id();
        session.cancel(&mut fx.cx()).unwrap();
        assert!(fx.overlays.polygons.is_empty());
        assert!(fx.platform.handle(id).unwrap().discarded);
        assert!(!fx.platform.handle(id).unwrap().attached);
    }

    #[test]
    fn test_free_text_point_is_geocoded() {
        let mut fx = Fixture::new();
        let draft = Overlay::draft(PolylineAttrs::default(), fx.platform.as_ref());
        let mut session = PolylineSession::open_draft(core(4), draft, fx.platform.as_ref());
        let mut form = SessionForm::new(&mut session, fx.cx());
        form.add_point("Main Street").unwrap();
        assert!(form.overlay().unwrap().points().is_empty());
        drop(form);

        let done = fx.tasks.poll_ready();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].ticket.purpose, Purpose::PathPoint);
        assert_eq!(done[0].ticket.session, Some(SessionToken(4)));
        assert_eq!(
            fx.platform.geocode_requests(),
            vec![GeocodeRequest::Address("Main Street".to_string())]
        );
    }

    #[test]
    fn test_set_content_marks_custom() {
        let mut fx = Fixture::new();
        let draft = Overlay::draft(MarkerAttrs::default(), fx.platform.as_ref());
        let mut session = MarkerSession::open_draft(core(5), draft, fx.platform.as_ref());
        let mut form = SessionForm::new(&mut session, fx.cx());
        form.set_content("Meet here").unwrap();
        let attrs = form.attrs().unwrap();
        assert!(attrs.common.custom_content);
        assert_eq!(attrs.common.content, Content::Text("Meet here".into()));
        assert!(form.render().unwrap().contains("session-form"));
    }

    #[test]
    fn test_ground_overlay_corners() {
        let mut fx = Fixture::new();
        let platform = fx.platform.clone();
        let draft = Overlay::draft(GroundOverlayAttrs::default(), platform.as_ref());
        let mut session =
            GroundOverlaySession::open_draft(core(6), draft, platform.as_ref());
        let mut form = SessionForm::new(&mut session, fx.cx());
        form.set_corner(CornerSlot::SouthWest, LatLng::new(1.0, 1.0)).unwrap();
        form.set_corner(CornerSlot::NorthEast, "2,2").unwrap();
        form.set_url("https://example.com/plan.png").unwrap();
        let overlay = form.overlay().unwrap();
        assert!(overlay.bounds().is_some());
        assert!(platform.handle(overlay.id()).unwrap().attached);
    }
}
