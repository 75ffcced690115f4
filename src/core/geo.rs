use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Equatorial earth radius in meters
const EARTH_RADIUS: f64 = 6378137.0;

static LAT_LNG_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*$").expect("valid lat,lng regex")
});

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Parses text of the form `"<lat>,<lng>"`.
    ///
    /// Anything else (including out of range pairs) yields `None` so the caller
    /// can fall back to treating the input as an address.
    pub fn parse_pair(input: &str) -> Option<Self> {
        let captures = LAT_LNG_PAIR.captures(input)?;
        let lat = captures.get(1)?.as_str().parse::<f64>().ok()?;
        let lng = captures.get(2)?.as_str().parse::<f64>().ok()?;
        let parsed = Self::new(lat, lng);
        parsed.is_valid().then_some(parsed)
    }

    /// Calculates the distance to another LatLng using the Haversine formula
    pub fn distance_to(&self, other: &LatLng) -> f64 {
        let lat1_rad = self.lat.to_radians();
        let lat2_rad = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lng = (other.lng - self.lng).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS * c
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl From<LatLng> for geo_types::Point<f64> {
    fn from(value: LatLng) -> Self {
        geo_types::Point::new(value.lng, value.lat)
    }
}

impl From<geo_types::Point<f64>> for LatLng {
    fn from(value: geo_types::Point<f64>) -> Self {
        LatLng::new(value.y(), value.x())
    }
}

/// User-supplied location: a coordinate, or text still to be geocoded.
#[derive(Debug, Clone, PartialEq)]
pub enum PointInput {
    Coordinate(LatLng),
    Address(String),
}

impl PointInput {
    /// `"<lat>,<lng>"` text becomes a coordinate, anything else an address.
    pub fn classify(text: &str) -> Self {
        match LatLng::parse_pair(text) {
            Some(position) => PointInput::Coordinate(position),
            None => PointInput::Address(text.trim().to_string()),
        }
    }
}

impl From<LatLng> for PointInput {
    fn from(position: LatLng) -> Self {
        PointInput::Coordinate(position)
    }
}

impl From<&str> for PointInput {
    fn from(text: &str) -> Self {
        PointInput::classify(text)
    }
}

/// Represents a bounding box of geographical coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self::new(LatLng::new(south, west), LatLng::new(north, east))
    }

    /// Degenerate bounds covering exactly one point
    pub fn from_point(point: LatLng) -> Self {
        Self::new(point, point)
    }

    /// Smallest bounds containing every point, `None` for an empty slice
    pub fn from_points(points: &[LatLng]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self::from_point(*first);
        for point in rest {
            bounds.extend(point);
        }
        Some(bounds)
    }

    /// Checks if the bounds contain a point
    pub fn contains(&self, point: &LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }

    /// Extends the bounds to include a point
    pub fn extend(&mut self, point: &LatLng) {
        self.south_west.lat = self.south_west.lat.min(point.lat);
        self.south_west.lng = self.south_west.lng.min(point.lng);
        self.north_east.lat = self.north_east.lat.max(point.lat);
        self.north_east.lng = self.north_east.lng.max(point.lng);
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    /// True when both corners coincide
    pub fn is_point(&self) -> bool {
        self.south_west == self.north_east
    }

    /// Returns the union of this bounds with another bounds
    pub fn union(&self, other: &LatLngBounds) -> LatLngBounds {
        let south = self.south_west.lat.min(other.south_west.lat);
        let west = self.south_west.lng.min(other.south_west.lng);
        let north = self.north_east.lat.max(other.north_east.lat);
        let east = self.north_east.lng.max(other.north_east.lng);

        LatLngBounds::new(LatLng::new(south, west), LatLng::new(north, east))
    }
}

impl From<geo_types::Rect<f64>> for LatLngBounds {
    fn from(rect: geo_types::Rect<f64>) -> Self {
        LatLngBounds::from_coords(rect.min().y, rect.min().x, rect.max().y, rect.max().x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_lng_creation() {
        let coord = LatLng::new(40.7128, -74.0060);
        assert_eq!(coord.lat, 40.7128);
        assert_eq!(coord.lng, -74.0060);
        assert!(coord.is_valid());
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(LatLng::parse_pair("10,20"), Some(LatLng::new(10.0, 20.0)));
        assert_eq!(
            LatLng::parse_pair(" -33.5 , 151.25 "),
            Some(LatLng::new(-33.5, 151.25))
        );
        assert_eq!(LatLng::parse_pair("Springfield, IL"), None);
        assert_eq!(LatLng::parse_pair("95,20"), None);
        assert_eq!(LatLng::parse_pair("10;20"), None);
    }

    #[test]
    fn test_lat_lng_distance() {
        let nyc = LatLng::new(40.7128, -74.0060);
        let la = LatLng::new(34.0522, -118.2437);
        let distance = nyc.distance_to(&la);

        // Distance should be approximately 3944 km
        assert!((distance - 3944000.0).abs() < 10000.0);
    }

    #[test]
    fn test_point_input_classify() {
        assert_eq!(
            PointInput::classify("51.5,-0.12"),
            PointInput::Coordinate(LatLng::new(51.5, -0.12))
        );
        assert_eq!(
            PointInput::from(" 10 Downing St, London "),
            PointInput::Address("10 Downing St, London".to_string())
        );
    }

    #[test]
    fn test_bounds_from_points() {
        assert!(LatLngBounds::from_points(&[]).is_none());

        let bounds = LatLngBounds::from_points(&[
            LatLng::new(1.0, 5.0),
            LatLng::new(-2.0, 3.0),
            LatLng::new(4.0, -1.0),
        ])
        .unwrap();
        assert_eq!(bounds, LatLngBounds::from_coords(-2.0, -1.0, 4.0, 5.0));
        assert!(bounds.contains(&LatLng::new(0.0, 0.0)));
        assert!(!bounds.is_point());
    }

    #[test]
    fn test_bounds_union() {
        let a = LatLngBounds::from_coords(0.0, 0.0, 1.0, 1.0);
        let b = LatLngBounds::from_point(LatLng::new(5.0, -5.0));
        assert_eq!(a.union(&b), LatLngBounds::from_coords(0.0, -5.0, 5.0, 1.0));
    }
}
