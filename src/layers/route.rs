//! Multi-stop routes.
//!
//! A route keeps two parallel, equally long lists: the persisted
//! [`Location`]s and one draggable [`RouteMarker`] per location. The marker
//! at index `i` always belongs to the location at index `i`; every operation
//! below mutates both lists together. The drawn path comes from the
//! directions service and is never persisted.

use crate::{
    core::{
        config::RouteConfig,
        constants::ROUTE_MARKER_LABELS,
        geo::{LatLng, LatLngBounds},
    },
    layers::{
        base::{CommonAttrs, Overlay, OverlayAttributes, OverlayKind},
        marker::{Marker, MarkerAttrs},
    },
    platform::{
        DirectionsRequest, DirectionsResult, GeocodeResult, HandleId, Interaction,
        MappingPlatform, Primitive, Templates, TravelMode, Waypoint,
    },
    traits::OverlayOperations,
    MapError, Result,
};
use serde::{Deserialize, Serialize};

/// One stop of a route. Not an overlay of its own.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
    pub icon: Option<String>,
    pub is_saved_to_map: bool,
}

impl Location {
    pub fn new(position: LatLng, address: impl Into<String>) -> Self {
        Self {
            lat: position.lat,
            lng: position.lng,
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn from_geocode(result: &GeocodeResult) -> Self {
        Self::new(result.location, result.formatted_address.clone())
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

/// Options forwarded to the directions service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteOptions {
    pub travel_mode: TravelMode,
    pub avoid_ferries: bool,
    pub avoid_highways: bool,
    pub avoid_tolls: bool,
    pub duration_in_traffic: bool,
    pub optimize_waypoints: bool,
    pub provide_route_alternatives: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteAttrs {
    #[serde(flatten)]
    pub common: CommonAttrs,
    pub locations: Vec<Location>,
    #[serde(flatten)]
    pub options: RouteOptions,
    /// Last path returned by the directions service
    #[serde(skip)]
    pub path: Vec<LatLng>,
}

impl RouteAttrs {
    pub fn positions(&self) -> Vec<LatLng> {
        self.locations.iter().map(Location::position).collect()
    }
}

impl OverlayAttributes for RouteAttrs {
    const KIND: OverlayKind = OverlayKind::Route;

    crate::impl_common_accessors!(common);

    fn primitive(&self) -> Primitive {
        Primitive::Directions {
            path: self.path.clone(),
        }
    }

    fn bounds(&self) -> Option<LatLngBounds> {
        LatLngBounds::from_points(&self.positions())
    }

    fn info_window_position(&self) -> LatLng {
        self.locations
            .first()
            .map(Location::position)
            .unwrap_or_default()
    }

    fn is_drawable(&self) -> bool {
        self.locations.len() >= 2 && !self.path.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    /// No locations
    Empty,
    /// One location, nothing drawn
    Partial,
    /// Two or more locations, directions requested
    Routed,
}

/// A marker pinned to one location of a route.
pub struct RouteMarker {
    marker: Marker,
    route: HandleId,
    snapshot: Option<MarkerAttrs>,
}

impl RouteMarker {
    fn new(location: &Location, route: HandleId, platform: &dyn MappingPlatform) -> Self {
        let mut attrs = MarkerAttrs::at(location.position());
        attrs.address = location.address.clone();
        attrs.icon = location.icon.clone();
        attrs.draggable = true;
        Self {
            marker: Marker::create(attrs, platform),
            route,
            snapshot: None,
        }
    }

    pub fn id(&self) -> HandleId {
        self.marker.id()
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    /// Owning route
    pub fn route(&self) -> HandleId {
        self.route
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    fn take_snapshot(&mut self) {
        self.snapshot = Some(self.marker.attrs().clone());
    }

    fn revert(&mut self, platform: &dyn MappingPlatform) {
        if let Some(snapshot) = self.snapshot.take() {
            self.marker.reset(platform, snapshot);
        } else {
            self.marker.restore(platform);
        }
    }

    fn hide(&mut self, platform: &dyn MappingPlatform) {
        self.marker.remove(platform);
    }

    /// Detach the marker for good.
    pub fn discard(mut self, platform: &dyn MappingPlatform) {
        self.marker.discard(platform);
    }
}

/// Route markers follow the route's drag state but are never shape-editable.
fn marker_interaction(route: Interaction) -> Interaction {
    Interaction {
        draggable: route.draggable,
        editable: false,
    }
}

/// What a route session needs to put a route back as it was.
#[derive(Debug, Clone)]
pub struct RouteSnapshot {
    attrs: RouteAttrs,
    marker_ids: Vec<HandleId>,
}

impl RouteSnapshot {
    pub fn contains_marker(&self, id: HandleId) -> bool {
        self.marker_ids.contains(&id)
    }

    pub fn attrs(&self) -> &RouteAttrs {
        &self.attrs
    }
}

pub struct Route {
    base: Overlay<RouteAttrs>,
    markers: Vec<RouteMarker>,
    render_seq: u64,
}

impl Route {
    /// Wrap a route loaded from the persisted field.
    pub fn create(attrs: RouteAttrs, platform: &dyn MappingPlatform, config: &RouteConfig) -> Self {
        Self::with_base(Overlay::create(attrs, platform), platform, config)
    }

    /// Start an empty route from an "Add route" action.
    pub fn draft(options: RouteOptions, platform: &dyn MappingPlatform, config: &RouteConfig) -> Self {
        let attrs = RouteAttrs {
            options,
            ..Default::default()
        };
        Self::with_base(Overlay::draft(attrs, platform), platform, config)
    }

    fn with_base(base: Overlay<RouteAttrs>, platform: &dyn MappingPlatform, config: &RouteConfig) -> Self {
        let id = base.id();
        let markers = base
            .attrs()
            .locations
            .iter()
            .map(|location| RouteMarker::new(location, id, platform))
            .collect();
        let mut route = Self {
            base,
            markers,
            render_seq: 0,
        };
        route.update_marker_icons(platform, config);
        if route.base.is_deleted() {
            route.markers.iter_mut().for_each(|marker| marker.hide(platform));
        }
        route
    }

    pub fn id(&self) -> HandleId {
        self.base.id()
    }

    pub fn base(&self) -> &Overlay<RouteAttrs> {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut Overlay<RouteAttrs> {
        &mut self.base
    }

    pub fn attrs(&self) -> &RouteAttrs {
        self.base.attrs()
    }

    pub fn locations(&self) -> &[Location] {
        &self.attrs().locations
    }

    pub fn markers(&self) -> &[RouteMarker] {
        &self.markers
    }

    pub fn options(&self) -> RouteOptions {
        self.attrs().options
    }

    pub fn path(&self) -> &[LatLng] {
        &self.attrs().path
    }

    pub fn is_new(&self) -> bool {
        self.base.is_new()
    }

    pub fn render_seq(&self) -> u64 {
        self.render_seq
    }

    pub fn state(&self) -> RouteState {
        match self.locations().len() {
            0 => RouteState::Empty,
            1 => RouteState::Partial,
            _ => RouteState::Routed,
        }
    }

    /// Interior stops; empty unless there are at least three locations.
    pub fn waypoints(&self) -> Vec<Waypoint> {
        let locations = self.locations();
        if locations.len() < 3 {
            return Vec::new();
        }
        locations[1..locations.len() - 1]
            .iter()
            .map(|location| Waypoint {
                location: location.position(),
                stopover: true,
            })
            .collect()
    }

    pub fn marker_index(&self, handle: HandleId) -> Option<usize> {
        self.markers.iter().position(|marker| marker.id() == handle)
    }

    pub fn add_location(
        &mut self,
        platform: &dyn MappingPlatform,
        config: &RouteConfig,
        location: Location,
    ) -> Result<()> {
        let max = config.max_locations.min(ROUTE_MARKER_LABELS.len());
        if self.locations().len() >= max {
            return Err(MapError::RouteFull { max }.into());
        }
        if !location.position().is_valid() {
            return Err(MapError::InvalidCoordinates {
                lat: location.lat,
                lng: location.lng,
            }
            .into());
        }

        let mut marker = RouteMarker::new(&location, self.id(), platform);
        marker
            .marker
            .set_interaction(platform, marker_interaction(self.base.interaction()));
        self.markers.push(marker);
        self.base.write_back(|attrs| attrs.locations.push(location));
        self.update_marker_icons(platform, config);
        Ok(())
    }

    /// Remove a location and its marker. The marker comes back hidden so an
    /// editing session can either discard it or put it back on cancel.
    pub fn remove_location(
        &mut self,
        platform: &dyn MappingPlatform,
        config: &RouteConfig,
        index: usize,
    ) -> Result<RouteMarker> {
        let len = self.markers.len();
        if index >= len {
            return Err(MapError::IndexOutOfBounds { index, len }.into());
        }

        let mut marker = self.markers.remove(index);
        marker.hide(platform);
        self.base.write_back(|attrs| {
            attrs.locations.remove(index);
        });
        if self.locations().len() < 2 {
            self.clear_path(platform);
        }
        self.update_marker_icons(platform, config);
        Ok(marker)
    }

    /// A route marker was dragged: move its location along with it.
    pub fn move_location(
        &mut self,
        platform: &dyn MappingPlatform,
        index: usize,
        position: LatLng,
    ) -> Result<()> {
        let len = self.markers.len();
        let marker = self
            .markers
            .get_mut(index)
            .ok_or(MapError::IndexOutOfBounds { index, len })?;
        marker.marker.move_to(platform, position);
        self.base.write_back(|attrs| {
            attrs.locations[index].lat = position.lat;
            attrs.locations[index].lng = position.lng;
        });
        Ok(())
    }

    /// Store a reverse-geocoded address on a location and its marker.
    pub fn set_location_address(
        &mut self,
        platform: &dyn MappingPlatform,
        index: usize,
        result: Option<&GeocodeResult>,
    ) -> Result<()> {
        let len = self.markers.len();
        let marker = self
            .markers
            .get_mut(index)
            .ok_or(MapError::IndexOutOfBounds { index, len })?;
        marker.marker.apply_geocode(platform, result);
        let address = marker.marker.attrs().address.clone();
        self.base
            .write_back(|attrs| attrs.locations[index].address = address);
        Ok(())
    }

    pub fn set_options(&mut self, options: RouteOptions) -> Vec<String> {
        self.base.write_back(|attrs| attrs.options = options)
    }

    /// Letter markers A, B, C, … in order; the last one gets the destination glyph.
    pub fn update_marker_icons(&mut self, platform: &dyn MappingPlatform, config: &RouteConfig) {
        let last = self.markers.len().saturating_sub(1);
        let mut icons = Vec::with_capacity(self.markers.len());
        for (index, marker) in self.markers.iter_mut().enumerate() {
            let Some(label) = ROUTE_MARKER_LABELS.get(index).copied() else {
                break;
            };
            let icon = config.icon_for(label, index == last);
            marker.marker.update(platform, |attrs| {
                attrs.icon = Some(icon.clone());
                attrs.common.title = label.to_string();
            });
            icons.push(icon);
        }
        self.base.write_back(|attrs| {
            for (location, icon) in attrs.locations.iter_mut().zip(icons) {
                location.icon = Some(icon);
            }
        });
    }

    /// Request built from the stored options, when origin and destination exist.
    pub fn directions_request(&self) -> Option<DirectionsRequest> {
        let locations = self.locations();
        if locations.len() < 2 {
            return None;
        }
        let origin = locations.first()?.position();
        let destination = locations.last()?.position();
        let options = self.options();
        Some(DirectionsRequest {
            origin,
            destination,
            waypoints: self.waypoints(),
            travel_mode: options.travel_mode,
            avoid_ferries: options.avoid_ferries,
            avoid_highways: options.avoid_highways,
            avoid_tolls: options.avoid_tolls,
            duration_in_traffic: options.duration_in_traffic,
            optimize_waypoints: options.optimize_waypoints,
            provide_route_alternatives: options.provide_route_alternatives,
        })
    }

    /// Start a render cycle. Returns the sequence number and request to send
    /// to the directions service, or `None` when there is nothing to route.
    /// Only the result carrying the newest sequence number is applied.
    pub fn render(&mut self, request: Option<DirectionsRequest>) -> Option<(u64, DirectionsRequest)> {
        let request = match request {
            Some(request) if self.locations().len() >= 2 => request,
            Some(_) => return None,
            None => self.directions_request()?,
        };
        self.render_seq += 1;
        Some((self.render_seq, request))
    }

    /// Draw a directions result; stale sequence numbers are ignored.
    pub fn apply_directions(
        &mut self,
        platform: &dyn MappingPlatform,
        seq: u64,
        result: DirectionsResult,
    ) -> bool {
        if seq != self.render_seq || self.locations().len() < 2 {
            return false;
        }
        self.base.write_back(|attrs| attrs.path = result.path);
        self.base.redraw(platform);
        true
    }

    fn clear_path(&mut self, platform: &dyn MappingPlatform) {
        self.render_seq += 1;
        self.base.write_back(|attrs| attrs.path.clear());
        self.base.redraw(platform);
    }

    pub fn set_interaction(&mut self, platform: &dyn MappingPlatform, interaction: Interaction) {
        self.base.set_interaction(platform, interaction);
        for marker in &mut self.markers {
            marker
                .marker
                .set_interaction(platform, marker_interaction(interaction));
        }
    }

    /// Snapshot the route and every marker, for a session to revert to.
    pub fn snapshot(&mut self) -> RouteSnapshot {
        for marker in &mut self.markers {
            marker.take_snapshot();
        }
        RouteSnapshot {
            attrs: self.attrs().clone(),
            marker_ids: self.markers.iter().map(RouteMarker::id).collect(),
        }
    }

    /// Drop marker snapshots once a session commits.
    pub fn forget_snapshots(&mut self) {
        for marker in &mut self.markers {
            marker.snapshot = None;
        }
    }

    /// Put the route back to `snapshot`. Markers created since are
    /// discarded; markers that existed then (including ones handed out by
    /// `remove_location` and passed back in `removed`) revert individually.
    pub fn revert(
        &mut self,
        platform: &dyn MappingPlatform,
        config: &RouteConfig,
        snapshot: RouteSnapshot,
        removed: Vec<RouteMarker>,
    ) {
        let mut pool: Vec<RouteMarker> = self.markers.drain(..).chain(removed).collect();
        let mut restored = Vec::with_capacity(snapshot.marker_ids.len());
        for id in &snapshot.marker_ids {
            if let Some(position) = pool.iter().position(|marker| marker.id() == *id) {
                let mut marker = pool.swap_remove(position);
                marker.revert(platform);
                restored.push(marker);
            }
        }
        for added in pool {
            added.discard(platform);
        }

        self.markers = restored;
        self.base.reset(platform, snapshot.attrs);
        self.render_seq += 1;
        self.update_marker_icons(platform, config);
    }

    /// Registered into the routes collection.
    pub fn mark_saved(&mut self) {
        self.base.mark_saved();
        self.base.write_back(|attrs| {
            for location in &mut attrs.locations {
                location.is_saved_to_map = true;
            }
        });
    }
}

impl OverlayOperations for Route {
    fn id(&self) -> HandleId {
        self.base.id()
    }

    fn kind(&self) -> OverlayKind {
        OverlayKind::Route
    }

    fn title(&self) -> &str {
        self.base.title()
    }

    fn is_deleted(&self) -> bool {
        self.base.is_deleted()
    }

    fn generation(&self) -> u64 {
        self.base.generation()
    }

    fn bounds(&self) -> Option<LatLngBounds> {
        self.attrs().bounds()
    }

    fn owns_handle(&self, handle: HandleId) -> bool {
        self.base.id() == handle || self.marker_index(handle).is_some()
    }

    fn remove(&mut self, platform: &dyn MappingPlatform) {
        self.base.remove(platform);
        for marker in &mut self.markers {
            marker.hide(platform);
        }
    }

    fn restore(&mut self, platform: &dyn MappingPlatform) {
        self.base.restore(platform);
        for marker in &mut self.markers {
            marker.marker.restore(platform);
        }
    }

    fn discard(&mut self, platform: &dyn MappingPlatform) {
        self.base.discard(platform);
        for marker in &mut self.markers {
            marker.marker.discard(platform);
        }
    }

    fn build_info_content(&mut self, templates: &dyn Templates) -> Result<()> {
        self.base.build_info_content(templates)
    }

    fn open_popup(&mut self, platform: &dyn MappingPlatform) {
        self.base.open_popup(platform)
    }

    fn close_popup(&mut self, platform: &dyn MappingPlatform) {
        self.base.close_popup(platform)
    }

    fn to_json(&mut self, platform: &dyn MappingPlatform) -> Result<serde_json::Value> {
        self.base.to_json(platform)
    }
}
