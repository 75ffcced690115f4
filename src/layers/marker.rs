use crate::{
    core::geo::{LatLng, LatLngBounds},
    layers::base::{CommonAttrs, Content, Overlay, OverlayAttributes, OverlayKind},
    platform::{AddressComponent, GeocodeResult, MappingPlatform, Primitive},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkerAttrs {
    #[serde(flatten)]
    pub common: CommonAttrs,
    pub lat: f64,
    pub lng: f64,
    pub address: String,
    pub address_components: Vec<AddressComponent>,
    pub icon: Option<String>,
    pub scaled_width: Option<f64>,
    pub scaled_height: Option<f64>,
    pub draggable: bool,
}

impl MarkerAttrs {
    pub fn at(position: LatLng) -> Self {
        Self {
            lat: position.lat,
            lng: position.lng,
            ..Default::default()
        }
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    /// Apply a reverse/forward geocode outcome to the address fields.
    ///
    /// On success the address is stored and, unless the author wrote their
    /// own content, the popup content becomes the address split into lines.
    /// On failure the address fields are cleared and content is left alone.
    pub fn apply_geocode(&mut self, result: Option<&GeocodeResult>) {
        match result {
            Some(result) => {
                self.address = result.formatted_address.clone();
                self.address_components = result.address_components.clone();
                if !self.common.custom_content {
                    self.common.content = Content::from_address(&result.formatted_address);
                }
            }
            None => {
                self.address.clear();
                self.address_components.clear();
            }
        }
    }
}

impl OverlayAttributes for MarkerAttrs {
    const KIND: OverlayKind = OverlayKind::Marker;

    crate::impl_common_accessors!(common);

    fn primitive(&self) -> Primitive {
        let scaled_size = match (self.scaled_width, self.scaled_height) {
            (Some(width), Some(height)) => Some((width, height)),
            _ => None,
        };
        Primitive::Marker {
            position: self.position(),
            title: self.common.title.clone(),
            icon: self.icon.clone(),
            scaled_size,
        }
    }

    fn bounds(&self) -> Option<LatLngBounds> {
        Some(LatLngBounds::from_point(self.position()))
    }

    fn info_window_position(&self) -> LatLng {
        self.position()
    }
}

pub type Marker = Overlay<MarkerAttrs>;

impl Overlay<MarkerAttrs> {
    pub fn position(&self) -> LatLng {
        self.attrs().position()
    }

    pub fn move_to(&mut self, platform: &dyn MappingPlatform, position: LatLng) -> Vec<String> {
        self.update(platform, |attrs| {
            attrs.lat = position.lat;
            attrs.lng = position.lng;
        })
    }

    pub fn apply_geocode(&mut self, platform: &dyn MappingPlatform, result: Option<&GeocodeResult>) {
        self.update(platform, |attrs| attrs.apply_geocode(result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HeadlessPlatform;

    #[test]
    fn test_marker_wire_format() {
        let json = serde_json::json!({
            "title": "Office",
            "content": ["1 Main St", "Springfield"],
            "lat": 10.0,
            "lng": 20.0,
            "address": "1 Main St, Springfield",
            "icon": null,
            "isSavedToMap": true
        });
        let attrs: MarkerAttrs = serde_json::from_value(json).unwrap();
        assert_eq!(attrs.common.title, "Office");
        assert_eq!(attrs.position(), LatLng::new(10.0, 20.0));
        assert!(attrs.common.is_saved_to_map);

        let back = serde_json::to_value(&attrs).unwrap();
        assert_eq!(back["addressComponents"], serde_json::json!([]));
        assert_eq!(back["customContent"], serde_json::json!(false));
        assert_eq!(back["scaledWidth"], serde_json::Value::Null);
    }

    #[test]
    fn test_apply_geocode_respects_custom_content() {
        let result = GeocodeResult::new("5 Elm St, Shelbyville", LatLng::new(1.0, 1.0));

        let mut plain = MarkerAttrs::default();
        plain.apply_geocode(Some(&result));
        assert_eq!(plain.address, "5 Elm St, Shelbyville");
        assert_eq!(plain.common.content.lines(), vec!["5 Elm St", "Shelbyville"]);

        let mut custom = MarkerAttrs::default();
        custom.common.custom_content = true;
        custom.common.content = Content::Text("My place".into());
        custom.apply_geocode(Some(&result));
        assert_eq!(custom.address, "5 Elm St, Shelbyville");
        assert_eq!(custom.common.content, Content::Text("My place".into()));

        custom.apply_geocode(None);
        assert!(custom.address.is_empty());
        assert_eq!(custom.common.content, Content::Text("My place".into()));
    }

    #[test]
    fn test_move_redraws_handle() {
        let platform = HeadlessPlatform::new();
        let mut marker = Marker::create(MarkerAttrs::at(LatLng::new(1.0, 2.0)), &platform);
        assert!(platform.handle(marker.id()).unwrap().attached);

        marker.move_to(&platform, LatLng::new(3.0, 4.0));
        match platform.handle(marker.id()).unwrap().primitive {
            Primitive::Marker { position, .. } => assert_eq!(position, LatLng::new(3.0, 4.0)),
            other => panic!("unexpected primitive {other:?}"),
        }
    }
}
