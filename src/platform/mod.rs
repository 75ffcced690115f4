//! Consumed collaborators: the mapping platform, geocoding, directions,
//! the host asset picker and the templating engine.
//!
//! Everything in this module is an interface. The crate never draws pixels,
//! loads tiles or computes routes itself; it only tells a platform what each
//! overlay looks like and reacts to what the platform reports back.

pub mod headless;

use crate::{
    core::geo::{LatLng, LatLngBounds},
    Result,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use headless::{HandleRecord, HeadlessPlatform, ViewportRecord};

/// Identifier of a live drawing handle owned by the platform.
///
/// Overlays have no identity of their own: an overlay's id is the id of the
/// handle it draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HandleId(pub u64);

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub opacity: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub color: String,
    pub opacity: f64,
}

/// Description of what a handle should draw.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Marker {
        position: LatLng,
        title: String,
        icon: Option<String>,
        scaled_size: Option<(f64, f64)>,
    },
    Circle {
        center: LatLng,
        radius_meters: f64,
        stroke: Stroke,
        fill: Fill,
    },
    Polygon {
        path: Vec<LatLng>,
        stroke: Stroke,
        fill: Fill,
    },
    Polyline {
        path: Vec<LatLng>,
        stroke: Stroke,
    },
    GroundOverlay {
        bounds: Option<LatLngBounds>,
        url: String,
        opacity: f64,
    },
    Directions {
        path: Vec<LatLng>,
    },
}

/// Direct-manipulation flags of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interaction {
    pub draggable: bool,
    pub editable: bool,
}

impl Interaction {
    pub fn frozen() -> Self {
        Self::default()
    }

    pub fn editing() -> Self {
        Self {
            draggable: true,
            editable: true,
        }
    }
}

/// Drawing, popups and viewport control.
pub trait MappingPlatform: Send + Sync {
    /// Create a handle drawing `primitive`. New handles start detached.
    fn create(&self, primitive: Primitive) -> HandleId;

    /// Replace what a handle draws.
    fn update(&self, handle: HandleId, primitive: Primitive);

    /// Attach the handle to the map, or detach it (`setMap(null)`).
    fn set_attached(&self, handle: HandleId, attached: bool);

    fn set_interaction(&self, handle: HandleId, interaction: Interaction);

    /// Detach and forget a handle for good.
    fn discard(&self, handle: HandleId);

    /// Current path of an editable polygon/polyline handle, as the user left it.
    fn live_path(&self, _handle: HandleId) -> Option<Vec<LatLng>> {
        None
    }

    fn open_popup(&self, handle: HandleId, markup: &str, position: LatLng);

    fn close_popup(&self, handle: HandleId);

    fn fit_bounds(&self, bounds: LatLngBounds);

    fn set_center(&self, center: LatLng);

    fn set_zoom(&self, zoom: f64);
}

/// A forward (address) or reverse (coordinate) geocode request.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeRequest {
    Address(String),
    Location(LatLng),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressComponent {
    pub long_name: String,
    pub short_name: String,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub formatted_address: String,
    pub address_components: Vec<AddressComponent>,
    pub location: LatLng,
}

impl GeocodeResult {
    pub fn new(formatted_address: impl Into<String>, location: LatLng) -> Self {
        Self {
            formatted_address: formatted_address.into(),
            address_components: Vec::new(),
            location,
        }
    }

    pub fn with_components(mut self, components: Vec<AddressComponent>) -> Self {
        self.address_components = components;
        self
    }
}

/// Non-OK geocoder statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeocodeStatus {
    #[error("no results")]
    ZeroResults,
    #[error("over query limit")]
    OverQueryLimit,
    #[error("request denied")]
    RequestDenied,
    #[error("invalid request")]
    InvalidRequest,
    #[error("unknown geocoder error")]
    UnknownError,
}

pub type GeocodeResponse = std::result::Result<Vec<GeocodeResult>, GeocodeStatus>;

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, request: GeocodeRequest) -> GeocodeResponse;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Bicycling,
    Transit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub location: LatLng,
    pub stopover: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsRequest {
    pub origin: LatLng,
    pub destination: LatLng,
    pub waypoints: Vec<Waypoint>,
    pub travel_mode: TravelMode,
    pub avoid_ferries: bool,
    pub avoid_highways: bool,
    pub avoid_tolls: bool,
    pub duration_in_traffic: bool,
    pub optimize_waypoints: bool,
    pub provide_route_alternatives: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsResult {
    pub path: Vec<LatLng>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DirectionsStatus {
    #[error("no route found")]
    ZeroResults,
    #[error("a location could not be geocoded")]
    NotFound,
    #[error("too many waypoints")]
    MaxWaypointsExceeded,
    #[error("request denied")]
    RequestDenied,
    #[error("unknown directions error")]
    UnknownError,
}

pub type DirectionsResponse = std::result::Result<DirectionsResult, DirectionsStatus>;

#[async_trait]
pub trait DirectionsService: Send + Sync {
    async fn route(&self, request: DirectionsRequest) -> DirectionsResponse;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    MarkerIcon,
    OverlayImage,
}

/// The host's asset-picker modal. Resolves to the chosen URL, or `None` when
/// the user closes the picker without choosing.
#[async_trait]
pub trait AssetPicker: Send + Sync {
    async fn pick(&self, kind: AssetKind) -> Option<String>;
}

/// Markup renderer used for popups, session forms and the review list.
pub trait Templates: Send + Sync {
    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String>;
}

/// Minimal built-in renderer for hosts that do not bring their own engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicTemplates;

impl Templates for BasicTemplates {
    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String> {
        let markup = match template {
            "info-window" => {
                let title = data["title"].as_str().unwrap_or_default();
                let lines = data["lines"]
                    .as_array()
                    .map(|lines| {
                        lines
                            .iter()
                            .filter_map(|line| line.as_str())
                            .map(escape)
                            .collect::<Vec<_>>()
                            .join("<br>")
                    })
                    .unwrap_or_default();
                format!(
                    "<div class=\"mapfield-info\"><h3>{}</h3><p>{}</p>\
                     <a data-action=\"edit\">Edit</a> <a data-action=\"delete\">Delete</a></div>",
                    escape(title),
                    lines
                )
            }
            _ => format!(
                "<div data-template=\"{}\">{}</div>",
                escape(template),
                escape(&serde_json::to_string(data)?)
            ),
        };
        Ok(markup)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Bundle of collaborators handed to a `MapSurface`.
#[derive(Clone)]
pub struct Services {
    pub platform: Arc<dyn MappingPlatform>,
    pub geocoder: Arc<dyn Geocoder>,
    pub directions: Arc<dyn DirectionsService>,
    pub assets: Arc<dyn AssetPicker>,
    pub templates: Arc<dyn Templates>,
}

impl Services {
    /// All collaborators served by one in-memory platform.
    pub fn headless(platform: Arc<HeadlessPlatform>) -> Self {
        Self {
            platform: platform.clone(),
            geocoder: platform.clone(),
            directions: platform.clone(),
            assets: platform,
            templates: Arc::new(BasicTemplates),
        }
    }

    pub fn with_templates(mut self, templates: Arc<dyn Templates>) -> Self {
        self.templates = templates;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_window_markup_escapes() {
        let markup = BasicTemplates
            .render(
                "info-window",
                &serde_json::json!({ "title": "<b>Home</b>", "lines": ["1 Main St", "Town & Co"] }),
            )
            .unwrap();
        assert!(markup.contains("&lt;b&gt;Home&lt;/b&gt;"));
        assert!(markup.contains("1 Main St<br>Town &amp; Co"));
        assert!(markup.contains("data-action=\"edit\""));
        assert!(markup.contains("data-action=\"delete\""));
    }

    #[test]
    fn test_escape_markup_characters() {
        assert_eq!(
            escape(r#"<a href="x">Tom & Jerry</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&lt;/a&gt;"
        );
        assert_eq!(escape("&lt;"), "&amp;lt;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_fallback_template_embeds_data() {
        let markup = BasicTemplates
            .render("overlay-list", &serde_json::json!({ "rows": [] }))
            .unwrap();
        assert!(markup.starts_with("<div data-template=\"overlay-list\">"));
    }

    #[test]
    fn test_travel_mode_wire_names() {
        assert_eq!(
            serde_json::to_value(TravelMode::Bicycling).unwrap(),
            serde_json::json!("BICYCLING")
        );
    }
}
