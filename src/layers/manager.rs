//! The six ordered overlay collections and their persisted document.

use crate::{
    core::{config::RouteConfig, geo::LatLngBounds},
    layers::{
        base::{OverlayKind, OverlayRef},
        circle::{Circle, CircleAttrs},
        image::{GroundOverlay, GroundOverlayAttrs},
        marker::{Marker, MarkerAttrs},
        polygon::{Polygon, PolygonAttrs, Polyline, PolylineAttrs},
        route::{Route, RouteAttrs},
    },
    platform::{HandleId, MappingPlatform},
    traits::OverlayOperations,
    Result,
};
use serde::{Deserialize, Serialize};

/// Persisted field layout: one array of attribute projections per kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldDocument {
    pub markers: Vec<MarkerAttrs>,
    pub polygons: Vec<PolygonAttrs>,
    pub polylines: Vec<PolylineAttrs>,
    pub routes: Vec<RouteAttrs>,
    pub circles: Vec<CircleAttrs>,
    pub ground_overlays: Vec<GroundOverlayAttrs>,
}

impl FieldDocument {
    /// An empty or blank field value is an empty document.
    pub fn parse(value: &str) -> Result<Self> {
        if value.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(value)?)
    }
}

/// Owns every overlay registered on a map surface.
#[derive(Default)]
pub struct Collections {
    pub markers: Vec<Marker>,
    pub polygons: Vec<Polygon>,
    pub polylines: Vec<Polyline>,
    pub routes: Vec<Route>,
    pub circles: Vec<Circle>,
    pub ground_overlays: Vec<GroundOverlay>,
}

/// Types stored in one of the collections.
pub trait CollectionMember: OverlayOperations + Sized {
    const KIND: OverlayKind;

    fn collection(overlays: &Collections) -> &Vec<Self>;

    fn collection_mut(overlays: &mut Collections) -> &mut Vec<Self>;

    fn find(overlays: &Collections, id: HandleId) -> Option<&Self> {
        Self::collection(overlays).iter().find(|item| item.id() == id)
    }

    fn find_mut(overlays: &mut Collections, id: HandleId) -> Option<&mut Self> {
        Self::collection_mut(overlays)
            .iter_mut()
            .find(|item| item.id() == id)
    }
}

macro_rules! collection_member {
    ($item:ty, $kind:expr, $field:ident) => {
        impl CollectionMember for $item {
            const KIND: OverlayKind = $kind;

            fn collection(overlays: &Collections) -> &Vec<Self> {
                &overlays.$field
            }

            fn collection_mut(overlays: &mut Collections) -> &mut Vec<Self> {
                &mut overlays.$field
            }
        }
    };
}

collection_member!(Marker, OverlayKind::Marker, markers);
collection_member!(Polygon, OverlayKind::Polygon, polygons);
collection_member!(Polyline, OverlayKind::Polyline, polylines);
collection_member!(Route, OverlayKind::Route, routes);
collection_member!(Circle, OverlayKind::Circle, circles);
collection_member!(GroundOverlay, OverlayKind::GroundOverlay, ground_overlays);

impl Collections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate every overlay of a loaded document. Soft-deleted entries
    /// come back hidden so they can still be restored.
    pub fn from_document(
        document: FieldDocument,
        platform: &dyn MappingPlatform,
        route_config: &RouteConfig,
    ) -> Self {
        Self {
            markers: document
                .markers
                .into_iter()
                .map(|attrs| Marker::create(attrs, platform))
                .collect(),
            polygons: document
                .polygons
                .into_iter()
                .map(|attrs| Polygon::create(attrs, platform))
                .collect(),
            polylines: document
                .polylines
                .into_iter()
                .map(|attrs| Polyline::create(attrs, platform))
                .collect(),
            routes: document
                .routes
                .into_iter()
                .map(|attrs| Route::create(attrs, platform, route_config))
                .collect(),
            circles: document
                .circles
                .into_iter()
                .map(|attrs| Circle::create(attrs, platform))
                .collect(),
            ground_overlays: document
                .ground_overlays
                .into_iter()
                .map(|attrs| GroundOverlay::create(attrs, platform))
                .collect(),
        }
    }

    pub fn push<T: CollectionMember>(&mut self, item: T) -> OverlayRef {
        let reference = OverlayRef::new(T::KIND, item.id());
        T::collection_mut(self).push(item);
        reference
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every overlay, collection by collection, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn OverlayOperations> + '_ {
        let markers = self.markers.iter().map(|item| item as &dyn OverlayOperations);
        let polygons = self.polygons.iter().map(|item| item as &dyn OverlayOperations);
        let polylines = self.polylines.iter().map(|item| item as &dyn OverlayOperations);
        let routes = self.routes.iter().map(|item| item as &dyn OverlayOperations);
        let circles = self.circles.iter().map(|item| item as &dyn OverlayOperations);
        let ground = self
            .ground_overlays
            .iter()
            .map(|item| item as &dyn OverlayOperations);
        markers
            .chain(polygons)
            .chain(polylines)
            .chain(routes)
            .chain(circles)
            .chain(ground)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut dyn OverlayOperations> + '_ {
        let markers = self
            .markers
            .iter_mut()
            .map(|item| item as &mut dyn OverlayOperations);
        let polygons = self
            .polygons
            .iter_mut()
            .map(|item| item as &mut dyn OverlayOperations);
        let polylines = self
            .polylines
            .iter_mut()
            .map(|item| item as &mut dyn OverlayOperations);
        let routes = self
            .routes
            .iter_mut()
            .map(|item| item as &mut dyn OverlayOperations);
        let circles = self
            .circles
            .iter_mut()
            .map(|item| item as &mut dyn OverlayOperations);
        let ground = self
            .ground_overlays
            .iter_mut()
            .map(|item| item as &mut dyn OverlayOperations);
        markers
            .chain(polygons)
            .chain(polylines)
            .chain(routes)
            .chain(circles)
            .chain(ground)
    }

    pub fn get(&self, reference: OverlayRef) -> Option<&dyn OverlayOperations> {
        self.iter()
            .find(|item| item.kind() == reference.kind && item.id() == reference.id)
    }

    pub fn get_mut(&mut self, reference: OverlayRef) -> Option<&mut dyn OverlayOperations> {
        self.iter_mut()
            .find(|item| item.kind() == reference.kind && item.id() == reference.id)
    }

    /// The overlay drawing `handle`, including route markers.
    pub fn owner_of(&self, handle: HandleId) -> Option<OverlayRef> {
        self.iter()
            .find(|item| item.owns_handle(handle))
            .map(|item| OverlayRef::new(item.kind(), item.id()))
    }

    /// Combined extent of every overlay that is not soft-deleted.
    pub fn bounds(&self) -> Option<LatLngBounds> {
        self.iter()
            .filter(|item| !item.is_deleted())
            .filter_map(|item| item.bounds())
            .reduce(|acc, bounds| acc.union(&bounds))
    }

    /// Remove an overlay for good and detach its handles.
    pub fn remove_permanently(&mut self, reference: OverlayRef, platform: &dyn MappingPlatform) -> bool {
        fn take<T: CollectionMember>(
            overlays: &mut Collections,
            id: HandleId,
            platform: &dyn MappingPlatform,
        ) -> bool {
            let items = T::collection_mut(overlays);
            match items.iter().position(|item| item.id() == id) {
                Some(index) => {
                    items.remove(index).discard(platform);
                    true
                }
                None => false,
            }
        }

        match reference.kind {
            OverlayKind::Marker => take::<Marker>(self, reference.id, platform),
            OverlayKind::Polygon => take::<Polygon>(self, reference.id, platform),
            OverlayKind::Polyline => take::<Polyline>(self, reference.id, platform),
            OverlayKind::Route => take::<Route>(self, reference.id, platform),
            OverlayKind::Circle => take::<Circle>(self, reference.id, platform),
            OverlayKind::GroundOverlay => take::<GroundOverlay>(self, reference.id, platform),
        }
    }

    /// Project every collection into the persisted JSON object.
    pub fn to_value(&mut self, platform: &dyn MappingPlatform) -> Result<serde_json::Value> {
        let mut document = serde_json::Map::new();
        for kind in OverlayKind::ALL {
            document.insert(
                kind.collection_key().to_string(),
                serde_json::Value::Array(Vec::new()),
            );
        }
        for item in self.iter_mut() {
            let value = item.to_json(platform)?;
            if let Some(serde_json::Value::Array(entries)) = document.get_mut(item.kind().collection_key()) {
                entries.push(value);
            }
        }
        Ok(serde_json::Value::Object(document))
    }
}
