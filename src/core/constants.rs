//! Engine-wide constants for overlay geometry and routing.

/// Meters in one mile.
pub const METERS_PER_MILE: f64 = 1609.34;

/// Meters in one foot.
pub const METERS_PER_FOOT: f64 = 0.3048;

/// Meters in one kilometer.
pub const METERS_PER_KILOMETER: f64 = 1000.0;

/// Miles in one meter.
pub const MILES_PER_METER: f64 = 0.000621371;

/// Feet in one meter.
pub const FEET_PER_METER: f64 = 3.28084;

/// Kilometers in one meter.
pub const KILOMETERS_PER_METER: f64 = 0.001;

/// Hard ceiling on stops in a single route (origin + 6 waypoints + destination).
pub const MAX_ROUTE_LOCATIONS: usize = 8;

/// Marker labels, assigned in location order.
pub const ROUTE_MARKER_LABELS: [char; MAX_ROUTE_LOCATIONS] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H'];

/// Position reported for overlays that have no single anchor point.
pub const FIXED_INFO_WINDOW_ORIGIN: (f64, f64) = (0.0, 0.0);
