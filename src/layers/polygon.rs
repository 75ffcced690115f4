//! Path overlays: closed, filled polygons and open polylines.
//!
//! Both keep their points in the attribute record, but the platform lets the
//! user reshape an editable handle directly. The record is therefore only a
//! cache between saves: whatever path the handle holds when the field is
//! serialized wins.

use crate::{
    core::geo::{LatLng, LatLngBounds},
    layers::base::{CommonAttrs, Overlay, OverlayAttributes, OverlayKind},
    platform::{Fill, HandleId, MappingPlatform, Primitive, Stroke},
    traits::HasPath,
    MapError, Result,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolygonAttrs {
    #[serde(flatten)]
    pub common: CommonAttrs,
    pub points: Vec<LatLng>,
    pub stroke_color: String,
    pub stroke_opacity: f64,
    pub stroke_weight: f64,
    pub fill_color: String,
    pub fill_opacity: f64,
}

impl Default for PolygonAttrs {
    fn default() -> Self {
        Self {
            common: CommonAttrs::default(),
            points: Vec::new(),
            stroke_color: "#FF0000".to_string(),
            stroke_opacity: 0.8,
            stroke_weight: 2.0,
            fill_color: "#FF0000".to_string(),
            fill_opacity: 0.35,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolylineAttrs {
    #[serde(flatten)]
    pub common: CommonAttrs,
    pub points: Vec<LatLng>,
    pub stroke_color: String,
    pub stroke_opacity: f64,
    pub stroke_weight: f64,
}

impl Default for PolylineAttrs {
    fn default() -> Self {
        Self {
            common: CommonAttrs::default(),
            points: Vec::new(),
            stroke_color: "#FF0000".to_string(),
            stroke_opacity: 0.8,
            stroke_weight: 2.0,
        }
    }
}

crate::impl_has_path!(PolygonAttrs, closed = true);
crate::impl_has_path!(PolylineAttrs, closed = false);

fn adopt_live_path(points: &mut Vec<LatLng>, platform: &dyn MappingPlatform, handle: HandleId) -> bool {
    match platform.live_path(handle) {
        Some(path) if path != *points => {
            *points = path;
            true
        }
        _ => false,
    }
}

impl OverlayAttributes for PolygonAttrs {
    const KIND: OverlayKind = OverlayKind::Polygon;

    crate::impl_common_accessors!(common);

    fn primitive(&self) -> Primitive {
        Primitive::Polygon {
            path: self.points.clone(),
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
        self.path_bounds()
    }

    fn info_window_position(&self) -> LatLng {
        self.path_bounds()
            .map(|bounds| bounds.center())
            .unwrap_or_default()
    }

    fn adopt_live_geometry(&mut self, platform: &dyn MappingPlatform, handle: HandleId) -> bool {
        adopt_live_path(&mut self.points, platform, handle)
    }
}

impl OverlayAttributes for PolylineAttrs {
    const KIND: OverlayKind = OverlayKind::Polyline;

    crate::impl_common_accessors!(common);

    fn primitive(&self) -> Primitive {
        Primitive::Polyline {
            path: self.points.clone(),
            stroke: Stroke {
                color: self.stroke_color.clone(),
                opacity: self.stroke_opacity,
                weight: self.stroke_weight,
            },
        }
    }

    fn bounds(&self) -> Option<LatLngBounds> {
        self.path_bounds()
    }

    fn info_window_position(&self) -> LatLng {
        // Popups on lines anchor at the first vertex
        self.points.first().copied().unwrap_or_default()
    }

    fn adopt_live_geometry(&mut self, platform: &dyn MappingPlatform, handle: HandleId) -> bool {
        adopt_live_path(&mut self.points, platform, handle)
    }
}

pub type Polygon = Overlay<PolygonAttrs>;
pub type Polyline = Overlay<PolylineAttrs>;

impl<A> Overlay<A>
where
    A: OverlayAttributes + HasPath,
{
    pub fn points(&self) -> &[LatLng] {
        self.attrs().points()
    }

    pub fn push_point(&mut self, platform: &dyn MappingPlatform, point: LatLng) -> Vec<String> {
        self.update(platform, |attrs| attrs.points_mut().push(point))
    }

    pub fn remove_point(&mut self, platform: &dyn MappingPlatform, index: usize) -> Result<LatLng> {
        let len = self.points().len();
        if index >= len {
            return Err(MapError::IndexOutOfBounds { index, len }.into());
        }
        let mut removed = LatLng::default();
        self.update(platform, |attrs| removed = attrs.points_mut().remove(index));
        Ok(removed)
    }

    /// The user reshaped the handle.
    pub fn path_changed(&mut self, path: Vec<LatLng>) -> Vec<String> {
        self.write_back(|attrs| *attrs.points_mut() = path)
    }
}
