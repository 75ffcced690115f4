use crate::{core::geo::LatLng, platform::HandleId};

/// Events the mapping platform reports about handles and the map itself
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    /// A draggable handle was dropped at a new position
    DragEnd { handle: HandleId, position: LatLng },
    /// A circle's center was moved on the handle
    CenterChanged { handle: HandleId, center: LatLng },
    /// A circle was resized on the handle, in meters
    RadiusChanged { handle: HandleId, meters: f64 },
    /// An editable polygon or polyline was reshaped
    PathChanged { handle: HandleId, path: Vec<LatLng> },
    /// Click on a handle
    Click { handle: HandleId },
    /// Click on the map away from any handle
    MapClick { position: LatLng },
}

impl PlatformEvent {
    /// Handle the event concerns, if any
    pub fn handle(&self) -> Option<HandleId> {
        match self {
            PlatformEvent::DragEnd { handle, .. }
            | PlatformEvent::CenterChanged { handle, .. }
            | PlatformEvent::RadiusChanged { handle, .. }
            | PlatformEvent::PathChanged { handle, .. }
            | PlatformEvent::Click { handle } => Some(*handle),
            PlatformEvent::MapClick { .. } => None,
        }
    }
}

/// Whether an event changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventHandled {
    Handled,
    NotHandled,
}
