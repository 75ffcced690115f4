//! Configuration for one map field
//!
//! A `MapFieldConfig` is handed to every `MapSurface` at construction. It
//! groups viewport behavior, route limits and icons, the defaults applied to
//! newly added overlays, and the names of the templates the host renders.

use crate::{
    core::{constants::MAX_ROUTE_LOCATIONS, geo::LatLng},
    layers::circle::Metric,
    traits::Configurable,
    MapError, Result,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapFieldConfig {
    /// Name of the persisted form field
    pub field_name: String,
    pub viewport: ViewportConfig,
    pub route: RouteConfig,
    pub defaults: OverlayDefaults,
    pub templates: TemplateNames,
}

impl Default for MapFieldConfig {
    fn default() -> Self {
        Self {
            field_name: "map".to_string(),
            viewport: ViewportConfig::default(),
            route: RouteConfig::default(),
            defaults: OverlayDefaults::default(),
            templates: TemplateNames::default(),
        }
    }
}

impl MapFieldConfig {
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            ..Default::default()
        }
    }

    /// Parse a host-supplied JSON configuration, tolerating missing keys.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let max = self.route.max_locations;
        if !(2..=MAX_ROUTE_LOCATIONS).contains(&max) {
            return Err(MapError::Config(format!(
                "route.maxLocations must be between 2 and {MAX_ROUTE_LOCATIONS}, got {max}"
            ))
            .into());
        }

        let opacities = [
            ("defaults.strokeOpacity", self.defaults.stroke_opacity),
            ("defaults.fillOpacity", self.defaults.fill_opacity),
            ("defaults.groundOverlayOpacity", self.defaults.ground_overlay_opacity),
        ];
        for (name, value) in opacities {
            if !(0.0..=1.0).contains(&value) {
                return Err(MapError::Config(format!("{name} must be within 0..=1, got {value}")).into());
            }
        }

        if !self.viewport.default_center.is_valid() {
            return Err(MapError::InvalidCoordinates {
                lat: self.viewport.default_center.lat,
                lng: self.viewport.default_center.lng,
            }
            .into());
        }
        Ok(())
    }
}

impl Configurable for MapFieldConfig {
    type Config = MapFieldConfig;

    fn config(&self) -> &Self::Config {
        self
    }

    fn set_config(&mut self, config: Self::Config) -> Result<()> {
        config.validate()?;
        *self = config;
        Ok(())
    }

    fn validate_config(config: &Self::Config) -> Result<()> {
        config.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewportConfig {
    pub default_center: LatLng,
    pub default_zoom: f64,
    /// Zoom applied when every overlay collapses onto one point
    pub single_point_zoom: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            default_center: LatLng::new(0.0, 0.0),
            default_zoom: 2.0,
            single_point_zoom: 14.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteConfig {
    pub max_locations: usize,
    /// Icon URL for origin and waypoint markers; `{label}` is replaced by the letter
    pub waypoint_icon: String,
    /// Icon URL for the destination marker
    pub destination_icon: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            max_locations: MAX_ROUTE_LOCATIONS,
            waypoint_icon: "https://maps.google.com/mapfiles/marker_green{label}.png".to_string(),
            destination_icon: "https://maps.google.com/mapfiles/marker{label}.png".to_string(),
        }
    }
}

impl RouteConfig {
    pub fn icon_for(&self, label: char, is_destination: bool) -> String {
        let template = if is_destination {
            &self.destination_icon
        } else {
            &self.waypoint_icon
        };
        template.replace("{label}", &label.to_string())
    }
}

/// Attributes applied to overlays created by an "Add" action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayDefaults {
    pub circle_radius: f64,
    pub circle_metric: Metric,
    pub stroke_color: String,
    pub stroke_opacity: f64,
    pub stroke_weight: f64,
    pub fill_color: String,
    pub fill_opacity: f64,
    pub ground_overlay_opacity: f64,
}

impl Default for OverlayDefaults {
    fn default() -> Self {
        Self {
            circle_radius: 1.0,
            circle_metric: Metric::Miles,
            stroke_color: "#FF0000".to_string(),
            stroke_opacity: 0.8,
            stroke_weight: 2.0,
            fill_color: "#FF0000".to_string(),
            fill_opacity: 0.35,
            ground_overlay_opacity: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateNames {
    pub session_form: String,
    pub overlay_list: String,
}

impl Default for TemplateNames {
    fn default() -> Self {
        Self {
            session_form: "session-form".to_string(),
            overlay_list: "overlay-list".to_string(),
        }
    }
}
