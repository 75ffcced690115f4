use crate::{
    core::{
        constants::FIXED_INFO_WINDOW_ORIGIN,
        geo::{LatLng, LatLngBounds},
    },
    layers::base::{CommonAttrs, Overlay, OverlayAttributes, OverlayKind},
    platform::{MappingPlatform, Primitive},
    traits::HasBoundsPair,
};
use serde::{Deserialize, Serialize};

/// One geocoded corner of a ground overlay.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Corner {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

impl Corner {
    pub fn new(position: LatLng, address: impl Into<String>) -> Self {
        Self {
            lat: position.lat,
            lng: position.lng,
            address: address.into(),
        }
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CornerSlot {
    SouthWest,
    NorthEast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroundOverlayAttrs {
    #[serde(flatten)]
    pub common: CommonAttrs,
    pub sw: Option<Corner>,
    pub ne: Option<Corner>,
    pub url: String,
    pub opacity: f64,
}

impl Default for GroundOverlayAttrs {
    fn default() -> Self {
        Self {
            common: CommonAttrs::default(),
            sw: None,
            ne: None,
            url: String::new(),
            opacity: 1.0,
        }
    }
}

impl GroundOverlayAttrs {
    pub fn corner(&self, slot: CornerSlot) -> Option<&Corner> {
        match slot {
            CornerSlot::SouthWest => self.sw.as_ref(),
            CornerSlot::NorthEast => self.ne.as_ref(),
        }
    }

    fn corner_mut(&mut self, slot: CornerSlot) -> &mut Option<Corner> {
        match slot {
            CornerSlot::SouthWest => &mut self.sw,
            CornerSlot::NorthEast => &mut self.ne,
        }
    }
}

impl HasBoundsPair for GroundOverlayAttrs {
    fn south_west(&self) -> Option<LatLng> {
        self.sw.as_ref().map(Corner::position)
    }

    fn north_east(&self) -> Option<LatLng> {
        self.ne.as_ref().map(Corner::position)
    }
}

impl OverlayAttributes for GroundOverlayAttrs {
    const KIND: OverlayKind = OverlayKind::GroundOverlay;

    crate::impl_common_accessors!(common);

    fn primitive(&self) -> Primitive {
        Primitive::GroundOverlay {
            bounds: self.corner_bounds(),
            url: self.url.clone(),
            opacity: self.opacity,
        }
    }

    fn bounds(&self) -> Option<LatLngBounds> {
        self.corner_bounds()
    }

    fn info_window_position(&self) -> LatLng {
        let (lat, lng) = FIXED_INFO_WINDOW_ORIGIN;
        LatLng::new(lat, lng)
    }

    fn is_drawable(&self) -> bool {
        self.corner_bounds().is_some()
    }
}

pub type GroundOverlay = Overlay<GroundOverlayAttrs>;

impl Overlay<GroundOverlayAttrs> {
    pub fn set_corner(
        &mut self,
        platform: &dyn MappingPlatform,
        slot: CornerSlot,
        corner: Corner,
    ) -> Vec<String> {
        self.update(platform, |attrs| *attrs.corner_mut(slot) = Some(corner))
    }

    pub fn set_url(&mut self, platform: &dyn MappingPlatform, url: impl Into<String>) -> Vec<String> {
        let url = url.into();
        self.update(platform, |attrs| attrs.url = url)
    }

    pub fn set_opacity(&mut self, platform: &dyn MappingPlatform, opacity: f64) -> Vec<String> {
        self.update(platform, |attrs| attrs.opacity = opacity.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HeadlessPlatform;

    #[test]
    fn test_attached_only_with_both_corners() {
        let platform = HeadlessPlatform::new();
        let mut overlay = GroundOverlay::draft(GroundOverlayAttrs::default(), &platform);
        assert!(!platform.handle(overlay.id()).unwrap().attached);
        assert!(overlay.attrs().bounds().is_none());

        overlay.set_corner(
            &platform,
            CornerSlot::SouthWest,
            Corner::new(LatLng::new(1.0, 2.0), "Lower left"),
        );
        assert!(!platform.handle(overlay.id()).unwrap().attached);

        overlay.set_corner(
            &platform,
            CornerSlot::NorthEast,
            Corner::new(LatLng::new(3.0, 4.0), "Upper right"),
        );
        assert!(platform.handle(overlay.id()).unwrap().attached);
        assert_eq!(
            overlay.attrs().bounds(),
            Some(LatLngBounds::from_coords(1.0, 2.0, 3.0, 4.0))
        );
    }

    #[test]
    fn test_info_window_at_fixed_origin() {
        let attrs = GroundOverlayAttrs {
            sw: Some(Corner::new(LatLng::new(10.0, 10.0), "")),
            ne: Some(Corner::new(LatLng::new(20.0, 20.0), "")),
            ..Default::default()
        };
        assert_eq!(attrs.info_window_position(), LatLng::new(0.0, 0.0));
    }

    #[test]
    fn test_opacity_is_clamped() {
        let platform = HeadlessPlatform::new();
        let mut overlay = GroundOverlay::draft(GroundOverlayAttrs::default(), &platform);
        overlay.set_opacity(&platform, 1.7);
        assert_eq!(overlay.attrs().opacity, 1.0);
    }
}
