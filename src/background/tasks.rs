//! Pending asynchronous work: geocodes, directions and asset picks.
//!
//! Collaborators answer through futures that may resolve long after the
//! user moved on. Each submitted future carries a [`Ticket`] describing who
//! asked and in which state; the map surface compares the ticket against the
//! current state before applying the outcome.

use crate::{
    layers::{base::OverlayRef, image::CornerSlot},
    platform::{
        AssetKind, AssetPicker, DirectionsRequest, DirectionsResponse, DirectionsService,
        GeocodeRequest, GeocodeResponse, Geocoder, HandleId,
    },
};
use futures::{
    future::BoxFuture,
    stream::{FuturesUnordered, StreamExt},
    FutureExt,
};
use std::collections::VecDeque;
use std::sync::Arc;

/// Identifies one editing session for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(pub u64);

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// What a completed task is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Reverse geocode after a drag or on session open
    MarkerAddress,
    /// Forward geocode of text typed into a marker form
    MarkerSearch,
    /// Point typed as free text into a polygon or polyline form
    PathPoint,
    CircleCenter,
    GroundCorner(CornerSlot),
    /// Location typed as free text into a route form
    RouteLocation,
    /// Reverse geocode after a route marker drag
    RouteMarkerAddress { marker: HandleId },
    Directions { seq: u64 },
    MarkerIcon,
    OverlayImage,
    GeocodeSearch,
}

/// Who asked, and what state they were in when they asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub purpose: Purpose,
    pub target: Option<OverlayRef>,
    /// Generation of the target when the task was submitted
    pub generation: u64,
    /// Set when the task belongs to an editing session
    pub session: Option<SessionToken>,
}

impl Ticket {
    pub fn new(purpose: Purpose, target: OverlayRef, generation: u64) -> Self {
        Self {
            purpose,
            target: Some(target),
            generation,
            session: None,
        }
    }

    /// A task with no overlay behind it, such as a free geocode search.
    pub fn untargeted(purpose: Purpose) -> Self {
        Self {
            purpose,
            target: None,
            generation: 0,
            session: None,
        }
    }

    pub fn in_session(mut self, session: Option<SessionToken>) -> Self {
        self.session = session;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Geocode(GeocodeResponse),
    Directions(DirectionsResponse),
    Asset(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTask {
    pub ticket: Ticket,
    pub outcome: TaskOutcome,
}

/// Counters kept for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub submitted: u64,
    pub completed: u64,
}

/// Futures waiting on collaborators, plus results not yet applied.
#[derive(Default)]
pub struct TaskQueue {
    pending: FuturesUnordered<BoxFuture<'static, CompletedTask>>,
    ready: VecDeque<CompletedTask>,
    stats: TaskStats,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geocode(&mut self, ticket: Ticket, geocoder: Arc<dyn Geocoder>, request: GeocodeRequest) {
        log::debug!("geocode {:?} for {:?}", request, ticket.purpose);
        self.submit(
            async move {
                let outcome = TaskOutcome::Geocode(geocoder.geocode(request).await);
                CompletedTask { ticket, outcome }
            }
            .boxed(),
        );
    }

    pub fn directions(
        &mut self,
        ticket: Ticket,
        service: Arc<dyn DirectionsService>,
        request: DirectionsRequest,
    ) {
        log::debug!(
            "directions with {} waypoints for {:?}",
            request.waypoints.len(),
            ticket.target
        );
        self.submit(
            async move {
                let outcome = TaskOutcome::Directions(service.route(request).await);
                CompletedTask { ticket, outcome }
            }
            .boxed(),
        );
    }

    pub fn pick_asset(&mut self, ticket: Ticket, assets: Arc<dyn AssetPicker>, kind: AssetKind) {
        self.submit(
            async move {
                let outcome = TaskOutcome::Asset(assets.pick(kind).await);
                CompletedTask { ticket, outcome }
            }
            .boxed(),
        );
    }

    /// Futures are lazy: poll once right away so the request actually
    /// reaches the collaborator, and keep the result if it is already there.
    fn submit(&mut self, mut task: BoxFuture<'static, CompletedTask>) {
        self.stats.submitted += 1;
        match (&mut task).now_or_never() {
            Some(done) => self.ready.push_back(done),
            None => self.pending.push(task),
        }
    }

    /// Every result available without waiting, in completion order.
    pub fn poll_ready(&mut self) -> Vec<CompletedTask> {
        while let Some(Some(done)) = self.pending.next().now_or_never() {
            self.ready.push_back(done);
        }
        self.stats.completed += self.ready.len() as u64;
        self.ready.drain(..).collect()
    }

    /// Wait for the next result; `None` once nothing is outstanding.
    pub async fn next_completed(&mut self) -> Option<CompletedTask> {
        let done = match self.ready.pop_front() {
            Some(done) => Some(done),
            None => self.pending.next().await,
        };
        if done.is_some() {
            self.stats.completed += 1;
        }
        done
    }

    /// Tasks submitted but not yet handed out.
    pub fn outstanding(&self) -> usize {
        self.pending.len() + self.ready.len()
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }

    pub fn stats(&self) -> TaskStats {
        self.stats
    }
}
