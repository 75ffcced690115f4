//! Editing sessions.
//!
//! A session binds one overlay (brand new or already saved) to a form for
//! its lifetime. It moves through [`SessionState::Opening`] (snapshot taken,
//! handle made editable) and [`SessionState::Editing`] (every change goes to
//! the live handle and the attribute model at once), and ends either
//! [`SessionState::Committed`] or [`SessionState::Cancelled`]. A cancelled
//! session discards a new overlay, or puts a saved one back exactly as it
//! was when the session opened.
//!
//! Sessions are stored on the `MapSurface`. A [`SessionForm`] borrows the
//! session together with the rest of the surface for as long as the host
//! works with the form.

pub mod geocode;
pub mod overlay;
pub mod route;

pub use geocode::GeocodeSession;
pub use overlay::{
    CircleSession, GroundOverlaySession, MarkerSession, OverlaySession, PolygonSession,
    PolylineSession, SessionKind, Target,
};
pub use route::{RouteSession, RouteTarget};

use crate::{
    background::{SessionToken, TaskQueue},
    core::config::MapFieldConfig,
    layers::{
        base::{OverlayKind, OverlayRef},
        manager::Collections,
    },
    platform::{HandleId, Services},
    traits::OverlayOperations,
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Editing,
    Committed,
    Cancelled,
}

/// Bookkeeping every session kind shares.
#[derive(Debug, Clone)]
pub struct SessionCore {
    token: SessionToken,
    return_to_list: bool,
    state: SessionState,
}

impl SessionCore {
    pub(crate) fn new(token: SessionToken, return_to_list: bool) -> Self {
        Self {
            token,
            return_to_list,
            state: SessionState::Opening,
        }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    /// Whether the review list comes back when the session closes
    pub fn return_to_list(&self) -> bool {
        self.return_to_list
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn begin_editing(&mut self) {
        self.transition(SessionState::Editing);
    }

    pub(crate) fn finish(&mut self, state: SessionState) {
        self.transition(state);
    }

    fn transition(&mut self, state: SessionState) {
        log::debug!("{}: {:?} -> {:?}", self.token, self.state, state);
        self.state = state;
    }
}

/// The parts of a map surface a session works on.
pub struct SessionContext<'a> {
    pub overlays: &'a mut Collections,
    pub services: &'a Services,
    pub tasks: &'a mut TaskQueue,
    pub config: &'a MapFieldConfig,
}

impl SessionContext<'_> {
    pub(crate) fn reborrow(&mut self) -> SessionContext<'_> {
        SessionContext {
            overlays: &mut *self.overlays,
            services: self.services,
            tasks: &mut *self.tasks,
            config: self.config,
        }
    }
}

/// A session borrowed together with the surface it edits.
pub struct SessionForm<'a, S> {
    session: &'a mut S,
    cx: SessionContext<'a>,
}

impl<'a, S> SessionForm<'a, S> {
    pub(crate) fn new(session: &'a mut S, cx: SessionContext<'a>) -> Self {
        Self { session, cx }
    }

    pub fn session(&self) -> &S {
        self.session
    }
}

/// The open session of a map surface, whatever it edits.
pub enum EditingSession {
    Marker(MarkerSession),
    Circle(CircleSession),
    Polygon(PolygonSession),
    Polyline(PolylineSession),
    GroundOverlay(GroundOverlaySession),
    Route(RouteSession),
    Geocode(GeocodeSession),
}

macro_rules! each_session {
    ($session:expr, $inner:ident => $body:expr) => {
        match $session {
            EditingSession::Marker($inner) => $body,
            EditingSession::Circle($inner) => $body,
            EditingSession::Polygon($inner) => $body,
            EditingSession::Polyline($inner) => $body,
            EditingSession::GroundOverlay($inner) => $body,
            EditingSession::Route($inner) => $body,
            EditingSession::Geocode($inner) => $body,
        }
    };
}

impl EditingSession {
    pub fn core(&self) -> &SessionCore {
        each_session!(self, session => session.core())
    }

    pub fn token(&self) -> SessionToken {
        self.core().token()
    }

    pub fn state(&self) -> SessionState {
        self.core().state()
    }

    /// Short name used in errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            EditingSession::Marker(_) => "marker",
            EditingSession::Circle(_) => "circle",
            EditingSession::Polygon(_) => "polygon",
            EditingSession::Polyline(_) => "polyline",
            EditingSession::GroundOverlay(_) => "ground overlay",
            EditingSession::Route(_) => "route",
            EditingSession::Geocode(_) => "geocode",
        }
    }

    /// Kind of overlay edited; `None` for a geocode search.
    pub fn kind(&self) -> Option<OverlayKind> {
        match self {
            EditingSession::Marker(_) => Some(OverlayKind::Marker),
            EditingSession::Circle(_) => Some(OverlayKind::Circle),
            EditingSession::Polygon(_) => Some(OverlayKind::Polygon),
            EditingSession::Polyline(_) => Some(OverlayKind::Polyline),
            EditingSession::GroundOverlay(_) => Some(OverlayKind::GroundOverlay),
            EditingSession::Route(_) => Some(OverlayKind::Route),
            EditingSession::Geocode(_) => None,
        }
    }

    /// Overlay being edited, new or saved.
    pub fn target(&self) -> Option<OverlayRef> {
        let id = match self {
            EditingSession::Marker(session) => session.target_id(),
            EditingSession::Circle(session) => session.target_id(),
            EditingSession::Polygon(session) => session.target_id(),
            EditingSession::Polyline(session) => session.target_id(),
            EditingSession::GroundOverlay(session) => session.target_id(),
            EditingSession::Route(session) => session.target_id(),
            EditingSession::Geocode(_) => return None,
        };
        Some(OverlayRef::new(self.kind()?, id))
    }

    /// The overlay this session created and has not committed yet.
    pub fn draft(&self) -> Option<&dyn OverlayOperations> {
        match self {
            EditingSession::Marker(session) => session.draft().map(|o| o as &dyn OverlayOperations),
            EditingSession::Circle(session) => session.draft().map(|o| o as &dyn OverlayOperations),
            EditingSession::Polygon(session) => session.draft().map(|o| o as &dyn OverlayOperations),
            EditingSession::Polyline(session) => {
                session.draft().map(|o| o as &dyn OverlayOperations)
            }
            EditingSession::GroundOverlay(session) => {
                session.draft().map(|o| o as &dyn OverlayOperations)
            }
            EditingSession::Route(session) => session.draft().map(|o| o as &dyn OverlayOperations),
            EditingSession::Geocode(_) => None,
        }
    }

    /// The unsaved overlay drawing `handle`, if this session holds one.
    pub fn draft_owner_of(&self, handle: HandleId) -> Option<OverlayRef> {
        self.draft()
            .filter(|draft| draft.owns_handle(handle))
            .map(|draft| OverlayRef::new(draft.kind(), draft.id()))
    }

    pub(crate) fn render(&mut self, cx: SessionContext<'_>) -> Result<String> {
        each_session!(self, session => SessionForm::new(session, cx).render())
    }

    pub(crate) fn commit(self, cx: &mut SessionContext<'_>) -> Result<Option<OverlayRef>> {
        match self {
            EditingSession::Marker(session) => session.commit(cx).map(Some),
            EditingSession::Circle(session) => session.commit(cx).map(Some),
            EditingSession::Polygon(session) => session.commit(cx).map(Some),
            EditingSession::Polyline(session) => session.commit(cx).map(Some),
            EditingSession::GroundOverlay(session) => session.commit(cx).map(Some),
            EditingSession::Route(session) => session.commit(cx).map(Some),
            EditingSession::Geocode(session) => session.commit(cx),
        }
    }

    pub(crate) fn cancel(self, cx: &mut SessionContext<'_>) -> Result<()> {
        each_session!(self, session => session.cancel(cx))
    }
}

/// Attribute keys changed since the form last asked, deduplicated and sorted.
pub(crate) fn changed_keys(changes: Vec<crate::layers::attributes::AttributeChange>) -> Vec<String> {
    let mut keys: Vec<String> = changes.into_iter().map(|change| change.key).collect();
    keys.sort();
    keys.dedup();
    keys
}
