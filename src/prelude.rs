//! Prelude module for common mapfield types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use mapfield::prelude::*;`

pub use crate::core::{
    config::{MapFieldConfig, OverlayDefaults, RouteConfig, TemplateNames, ViewportConfig},
    geo::{LatLng, LatLngBounds, PointInput},
    surface::{MapSurface, PersistedField},
};

pub use crate::layers::{
    attributes::{AttributeChange, AttributeModel},
    base::{CommonAttrs, Content, Overlay, OverlayAttributes, OverlayKind, OverlayRef},
    circle::{Circle, CircleAttrs, Metric},
    image::{Corner, CornerSlot, GroundOverlay, GroundOverlayAttrs},
    manager::{Collections, FieldDocument},
    marker::{Marker, MarkerAttrs},
    polygon::{Polygon, PolygonAttrs, Polyline, PolylineAttrs},
    route::{Location, Route, RouteAttrs, RouteOptions, RouteState},
};

pub use crate::session::{
    CircleSession, EditingSession, GeocodeSession, GroundOverlaySession, MarkerSession,
    PolygonSession, PolylineSession, RouteSession, SessionForm, SessionState,
};

pub use crate::background::{Purpose, SessionToken, TaskQueue, Ticket};

pub use crate::input::events::{EventHandled, PlatformEvent};

pub use crate::platform::{
    AssetKind, AssetPicker, DirectionsRequest, DirectionsResponse, DirectionsResult,
    DirectionsService, DirectionsStatus, GeocodeRequest, GeocodeResponse, GeocodeResult,
    GeocodeStatus, Geocoder, HandleId,
    HeadlessPlatform, Interaction, MappingPlatform, Primitive, Services, Templates, TravelMode,
};

pub use crate::traits::{Configurable, HasBoundsPair, HasPath, HasRadius, OverlayOperations};

pub use crate::ui::{ListRow, ModalContent, OverlayListView, PopupAction};

pub use crate::{Error as MapError, Result};

pub use std::sync::Arc;

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
