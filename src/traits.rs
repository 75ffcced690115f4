//! Shared trait abstractions
//!
//! Overlay kinds are composed from one shared core plus the capabilities
//! below, instead of inheriting from one another.

use crate::{
    core::geo::{LatLng, LatLngBounds},
    layers::base::OverlayKind,
    platform::{HandleId, MappingPlatform, Templates},
    Result,
};
use geo::BoundingRect;

/// Operations every entry of the six collections supports, whatever its kind.
pub trait OverlayOperations: Send + Sync {
    fn id(&self) -> HandleId;

    fn kind(&self) -> OverlayKind;

    fn title(&self) -> &str;

    fn is_deleted(&self) -> bool;

    /// Liveness counter checked before applying asynchronous results
    fn generation(&self) -> u64;

    /// Extent used when fitting the viewport
    fn bounds(&self) -> Option<LatLngBounds>;

    /// Whether `handle` is drawn by this overlay.
    fn owns_handle(&self, handle: HandleId) -> bool {
        self.id() == handle
    }

    /// Soft delete
    fn remove(&mut self, platform: &dyn MappingPlatform);

    /// Undo a soft delete
    fn restore(&mut self, platform: &dyn MappingPlatform);

    /// Permanently detach every handle
    fn discard(&mut self, platform: &dyn MappingPlatform);

    fn build_info_content(&mut self, templates: &dyn Templates) -> Result<()>;

    fn open_popup(&mut self, platform: &dyn MappingPlatform);

    fn close_popup(&mut self, platform: &dyn MappingPlatform);

    /// Attribute projection written to the persisted field
    fn to_json(&mut self, platform: &dyn MappingPlatform) -> Result<serde_json::Value>;
}

/// Overlays defined by an ordered list of points.
pub trait HasPath {
    fn points(&self) -> &[LatLng];

    fn points_mut(&mut self) -> &mut Vec<LatLng>;

    /// Whether the path closes into a filled area
    fn is_closed(&self) -> bool;

    fn path_bounds(&self) -> Option<LatLngBounds> {
        let points: geo_types::MultiPoint<f64> = self
            .points()
            .iter()
            .map(|point| geo_types::Point::from(*point))
            .collect();
        points.bounding_rect().map(LatLngBounds::from)
    }
}

/// Overlays with a radius shown in a user-selected metric.
pub trait HasRadius {
    fn center(&self) -> LatLng;

    /// Radius in the display metric
    fn radius(&self) -> f64;

    fn radius_meters(&self) -> f64;
}

/// Overlays stretched between two independently placed corners.
pub trait HasBoundsPair {
    fn south_west(&self) -> Option<LatLng>;

    fn north_east(&self) -> Option<LatLng>;

    /// Only defined once both corners are set
    fn corner_bounds(&self) -> Option<LatLngBounds> {
        let sw = self.south_west()?;
        let ne = self.north_east()?;
        Some(LatLngBounds::new(sw, ne))
    }
}

/// Trait for configurable components
pub trait Configurable {
    type Config: Clone;

    /// Get the current configuration
    fn config(&self) -> &Self::Config;

    /// Set new configuration
    fn set_config(&mut self, config: Self::Config) -> Result<()>;

    /// Validate configuration
    fn validate_config(config: &Self::Config) -> Result<()> {
        let _ = config;
        Ok(())
    }

    /// Update configuration with a partial change
    fn update_config<F>(&mut self, updater: F) -> Result<()>
    where
        F: FnOnce(&mut Self::Config),
    {
        let mut config = self.config().clone();
        updater(&mut config);
        Self::validate_config(&config)?;
        self.set_config(config)
    }
}
