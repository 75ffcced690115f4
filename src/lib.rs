//! # mapfield
//!
//! Overlay editing for a map annotation field.
//!
//! A [`MapSurface`] owns six collections of overlays (markers, polygons,
//! polylines, routes, circles and ground overlays), serializes them into a
//! single persisted JSON value, and lets the user change them through one
//! editing session at a time. Drawing, geocoding and directions are done by
//! an external mapping platform reached through the traits in [`platform`].

pub mod background;
pub mod core;
pub mod input;
pub mod layers;
pub mod platform;
pub mod prelude;
pub mod session;
pub mod traits;
pub mod ui;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::MapFieldConfig,
    geo::{LatLng, LatLngBounds, PointInput},
    surface::{MapSurface, PersistedField},
};

pub use layers::{
    base::{Content, OverlayKind, OverlayRef},
    circle::{Circle, Metric},
    image::{CornerSlot, GroundOverlay},
    marker::Marker,
    polygon::{Polygon, Polyline},
    route::{Location, Route, RouteOptions},
};

pub use input::events::{EventHandled, PlatformEvent};

pub use platform::{HeadlessPlatform, MappingPlatform, Services};

pub use session::{EditingSession, SessionForm, SessionState};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid coordinates: ({lat}, {lng})")]
    InvalidCoordinates { lat: f64, lng: f64 },

    #[error("Invalid radius: {0}")]
    InvalidRadius(f64),

    #[error("index {index} is out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("a route holds at most {max} locations")]
    RouteFull { max: usize },

    #[error("no editing session is open")]
    NoActiveSession,

    #[error("another editing session is already open")]
    SessionAlreadyOpen,

    #[error("expected a {expected} session, found a {found} session")]
    SessionMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unknown overlay: {0}")]
    UnknownOverlay(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// Error type alias for convenience
pub type Error = MapError;
