use crate::{
    core::{
        constants::{
            FEET_PER_METER, KILOMETERS_PER_METER, METERS_PER_FOOT, METERS_PER_KILOMETER,
            METERS_PER_MILE, MILES_PER_METER,
        },
        geo::{LatLng, LatLngBounds},
    },
    layers::base::{CommonAttrs, Overlay, OverlayAttributes, OverlayKind},
    platform::{Fill, MappingPlatform, Primitive, Stroke},
    traits::HasRadius,
};
use geo::HaversineDestination;
use serde::{Deserialize, Serialize};

/// Unit the circle radius is displayed and stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Feet,
    #[default]
    Miles,
    Meters,
    Kilometers,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Feet, Metric::Miles, Metric::Meters, Metric::Kilometers];

    pub fn to_meters(self, value: f64) -> f64 {
        match self {
            Metric::Feet => value * METERS_PER_FOOT,
            Metric::Miles => value * METERS_PER_MILE,
            Metric::Meters => value,
            Metric::Kilometers => value * METERS_PER_KILOMETER,
        }
    }

    pub fn from_meters(self, meters: f64) -> f64 {
        match self {
            Metric::Feet => meters * FEET_PER_METER,
            Metric::Miles => meters * MILES_PER_METER,
            Metric::Meters => meters,
            Metric::Kilometers => meters * KILOMETERS_PER_METER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CircleAttrs {
    #[serde(flatten)]
    pub common: CommonAttrs,
    pub lat: f64,
    pub lng: f64,
    /// In `metric` units, never meters unless the metric says so
    pub radius: f64,
    pub metric: Metric,
    pub stroke_color: String,
    pub stroke_opacity: f64,
    pub stroke_weight: f64,
    pub fill_color: String,
    pub fill_opacity: f64,
}

impl Default for CircleAttrs {
    fn default() -> Self {
        Self {
            common: CommonAttrs::default(),
            lat: 0.0,
            lng: 0.0,
            radius: 1.0,
            metric: Metric::default(),
            stroke_color: "#FF0000".to_string(),
            stroke_opacity: 0.8,
            stroke_weight: 2.0,
            fill_color: "#FF0000".to_string(),
            fill_opacity: 0.35,
        }
    }
}

impl HasRadius for CircleAttrs {
    fn center(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    fn radius(&self) -> f64 {
        self.radius
    }

    fn radius_meters(&self) -> f64 {
        self.metric.to_meters(self.radius)
    }
}

impl OverlayAttributes for CircleAttrs {
    const KIND: OverlayKind = OverlayKind::Circle;

    crate::impl_common_accessors!(common);

    fn primitive(&self) -> Primitive {
        Primitive::Circle {
            center: self.center(),
            radius_meters: self.radius_meters(),
            stroke: Stroke {
                color: self.stroke_color.clone(),
                opacity: self.stroke_opacity,
                weight: self.stroke_weight,
            },
            fill: Fill {
                color: self.fill_color.clone(),
                opacity: self.fill_opacity,
            },
        }
    }

    fn bounds(&self) -> Option<LatLngBounds> {
        let center = geo_types::Point::from(self.center());
        let meters = self.radius_meters();
        let extent: Vec<LatLng> = [0.0, 90.0, 180.0, 270.0]
            .into_iter()
            .map(|bearing| LatLng::from(center.haversine_destination(bearing, meters)))
            .collect();
        LatLngBounds::from_points(&extent)
    }

    fn info_window_position(&self) -> LatLng {
        self.center()
    }
}

pub type Circle = Overlay<CircleAttrs>;

impl Overlay<CircleAttrs> {
    /// Store `value` in the current metric; the handle gets meters.
    pub fn set_radius(&mut self, platform: &dyn MappingPlatform, value: f64) -> Vec<String> {
        self.update(platform, |attrs| attrs.radius = value)
    }

    /// Reinterpret the stored number under another unit.
    pub fn set_metric(&mut self, platform: &dyn MappingPlatform, metric: Metric) -> Vec<String> {
        self.update(platform, |attrs| attrs.metric = metric)
    }

    pub fn set_center(&mut self, platform: &dyn MappingPlatform, center: LatLng) -> Vec<String> {
        self.update(platform, |attrs| {
            attrs.lat = center.lat;
            attrs.lng = center.lng;
        })
    }

    /// The user resized the handle; `meters` is what the platform reports.
    pub fn radius_changed(&mut self, meters: f64) -> Vec<String> {
        self.write_back(|attrs| attrs.radius = attrs.metric.from_meters(meters))
    }

    /// The user dragged the handle.
    pub fn center_changed(&mut self, center: LatLng) -> Vec<String> {
        self.write_back(|attrs| {
            attrs.lat = center.lat;
            attrs.lng = center.lng;
        })
    }
}
