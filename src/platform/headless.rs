use super::{
    AssetKind, AssetPicker, DirectionsRequest, DirectionsResponse, DirectionsResult,
    DirectionsService, DirectionsStatus, GeocodeRequest, GeocodeResponse, GeocodeStatus, Geocoder,
    HandleId, Interaction, MappingPlatform, Primitive,
};
use crate::core::geo::{LatLng, LatLngBounds};
use async_trait::async_trait;
use futures::channel::oneshot;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Everything the headless platform knows about one handle.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleRecord {
    pub primitive: Primitive,
    pub attached: bool,
    pub interaction: Interaction,
    pub popup: Option<String>,
    pub discarded: bool,
}

/// Last viewport commands received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewportRecord {
    pub fitted: Option<LatLngBounds>,
    pub center: Option<LatLng>,
    pub zoom: Option<f64>,
    pub fit_count: usize,
}

#[derive(Default)]
struct HeadlessState {
    next_handle: u64,
    handles: BTreeMap<HandleId, HandleRecord>,
    live_paths: BTreeMap<HandleId, Vec<LatLng>>,
    viewport: ViewportRecord,
    scripted_geocodes: Vec<(GeocodeRequest, GeocodeResponse)>,
    defer_geocodes: bool,
    deferred_geocodes: VecDeque<(GeocodeRequest, oneshot::Sender<GeocodeResponse>)>,
    geocode_requests: Vec<GeocodeRequest>,
    fail_directions: bool,
    defer_directions: bool,
    deferred_directions: VecDeque<(DirectionsRequest, oneshot::Sender<DirectionsResponse>)>,
    directions_requests: Vec<DirectionsRequest>,
    asset_url: Option<String>,
}

enum Pending<T> {
    Ready(T),
    Deferred(oneshot::Receiver<T>),
}

/// In-memory implementation of every platform collaborator.
///
/// Useful for server-side processing of persisted fields and for tests:
/// geocodes are answered from a script (or held until resolved), directions
/// are straight lines through the requested stops.
#[derive(Default)]
pub struct HeadlessPlatform {
    state: Mutex<HeadlessState>,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Answer `request` with `response` whenever it is asked.
    pub fn script_geocode(&self, request: GeocodeRequest, response: GeocodeResponse) {
        self.state().scripted_geocodes.push((request, response));
    }

    /// Hold unscripted geocode requests until `resolve_next_geocode`.
    pub fn defer_geocodes(&self, defer: bool) {
        self.state().defer_geocodes = defer;
    }

    /// Resolve the oldest held geocode request. Returns the request, if any.
    pub fn resolve_next_geocode(&self, response: GeocodeResponse) -> Option<GeocodeRequest> {
        let (request, sender) = self.state().deferred_geocodes.pop_front()?;
        // Dropped tasks leave no receiver behind.
        let _ = sender.send(response);
        Some(request)
    }

    pub fn pending_geocodes(&self) -> usize {
        self.state().deferred_geocodes.len()
    }

    /// Every geocode request received, in order.
    pub fn geocode_requests(&self) -> Vec<GeocodeRequest> {
        self.state().geocode_requests.clone()
    }

    pub fn fail_directions(&self, fail: bool) {
        self.state().fail_directions = fail;
    }

    pub fn defer_directions(&self, defer: bool) {
        self.state().defer_directions = defer;
    }

    pub fn resolve_next_directions(&self, response: DirectionsResponse) -> Option<DirectionsRequest> {
        let (request, sender) = self.state().deferred_directions.pop_front()?;
        let _ = sender.send(response);
        Some(request)
    }

    pub fn directions_requests(&self) -> Vec<DirectionsRequest> {
        self.state().directions_requests.clone()
    }

    /// URL the asset picker returns; `None` simulates closing the picker.
    pub fn set_asset_url(&self, url: Option<String>) {
        self.state().asset_url = url;
    }

    /// Simulate the user reshaping an editable path without an event.
    pub fn set_live_path(&self, handle: HandleId, path: Vec<LatLng>) {
        self.state().live_paths.insert(handle, path);
    }

    pub fn handle(&self, handle: HandleId) -> Option<HandleRecord> {
        self.state().handles.get(&handle).cloned()
    }

    /// Handles currently attached to the map.
    pub fn attached_handles(&self) -> Vec<HandleId> {
        self.state()
            .handles
            .iter()
            .filter(|(_, record)| record.attached && !record.discarded)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn viewport(&self) -> ViewportRecord {
        self.state().viewport.clone()
    }

    fn begin_geocode(&self, request: GeocodeRequest) -> Pending<GeocodeResponse> {
        let mut state = self.state();
        state.geocode_requests.push(request.clone());

        let scripted = state
            .scripted_geocodes
            .iter()
            .find(|(scripted, _)| *scripted == request)
            .map(|(_, response)| response.clone());

        match scripted {
            Some(response) => Pending::Ready(response),
            None if state.defer_geocodes => {
                let (sender, receiver) = oneshot::channel();
                state.deferred_geocodes.push_back((request, sender));
                Pending::Deferred(receiver)
            }
            None => Pending::Ready(Err(GeocodeStatus::ZeroResults)),
        }
    }

    fn begin_route(&self, request: DirectionsRequest) -> Pending<DirectionsResponse> {
        let mut state = self.state();
        state.directions_requests.push(request.clone());

        if state.defer_directions {
            let (sender, receiver) = oneshot::channel();
            state.deferred_directions.push_back((request, sender));
            return Pending::Deferred(receiver);
        }
        if state.fail_directions {
            return Pending::Ready(Err(DirectionsStatus::ZeroResults));
        }

        let mut path = vec![request.origin];
        path.extend(request.waypoints.iter().map(|waypoint| waypoint.location));
        path.push(request.destination);
        Pending::Ready(Ok(DirectionsResult { path }))
    }

    fn with_record(&self, handle: HandleId, apply: impl FnOnce(&mut HandleRecord)) {
        if let Some(record) = self.state().handles.get_mut(&handle) {
            apply(record);
        }
    }
}

impl MappingPlatform for HeadlessPlatform {
    fn create(&self, primitive: Primitive) -> HandleId {
        let mut state = self.state();
        state.next_handle += 1;
        let id = HandleId(state.next_handle);
        state.handles.insert(
            id,
            HandleRecord {
                primitive,
                attached: false,
                interaction: Interaction::frozen(),
                popup: None,
                discarded: false,
            },
        );
        id
    }

    fn update(&self, handle: HandleId, primitive: Primitive) {
        let mut state = self.state();
        // A redraw replaces whatever path the user left on the handle.
        state.live_paths.remove(&handle);
        if let Some(record) = state.handles.get_mut(&handle) {
            record.primitive = primitive;
        }
    }

    fn set_attached(&self, handle: HandleId, attached: bool) {
        self.with_record(handle, |record| record.attached = attached && !record.discarded);
    }

    fn set_interaction(&self, handle: HandleId, interaction: Interaction) {
        self.with_record(handle, |record| record.interaction = interaction);
    }

    fn discard(&self, handle: HandleId) {
        self.with_record(handle, |record| {
            record.attached = false;
            record.popup = None;
            record.discarded = true;
        });
    }

    fn live_path(&self, handle: HandleId) -> Option<Vec<LatLng>> {
        self.state().live_paths.get(&handle).cloned()
    }

    fn open_popup(&self, handle: HandleId, markup: &str, _position: LatLng) {
        self.with_record(handle, |record| record.popup = Some(markup.to_string()));
    }

    fn close_popup(&self, handle: HandleId) {
        self.with_record(handle, |record| record.popup = None);
    }

    fn fit_bounds(&self, bounds: LatLngBounds) {
        let mut state = self.state();
        state.viewport.fitted = Some(bounds);
        state.viewport.fit_count += 1;
    }

    fn set_center(&self, center: LatLng) {
        self.state().viewport.center = Some(center);
    }

    fn set_zoom(&self, zoom: f64) {
        self.state().viewport.zoom = Some(zoom);
    }
}

#[async_trait]
impl Geocoder for HeadlessPlatform {
    async fn geocode(&self, request: GeocodeRequest) -> GeocodeResponse {
        match self.begin_geocode(request) {
            Pending::Ready(response) => response,
            Pending::Deferred(receiver) => receiver.await.unwrap_or(Err(GeocodeStatus::UnknownError)),
        }
    }
}

#[async_trait]
impl DirectionsService for HeadlessPlatform {
    async fn route(&self, request: DirectionsRequest) -> DirectionsResponse {
        match self.begin_route(request) {
            Pending::Ready(response) => response,
            Pending::Deferred(receiver) => {
                receiver.await.unwrap_or(Err(DirectionsStatus::UnknownError))
            }
        }
    }
}

#[async_trait]
impl AssetPicker for HeadlessPlatform {
    async fn pick(&self, _kind: AssetKind) -> Option<String> {
        self.state().asset_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{GeocodeResult, TravelMode};
    use futures::{executor::block_on, FutureExt};

    fn marker(lat: f64, lng: f64) -> Primitive {
        Primitive::Marker {
            position: LatLng::new(lat, lng),
            title: String::new(),
            icon: None,
            scaled_size: None,
        }
    }

    #[test]
    fn test_handles_start_detached() {
        let platform = HeadlessPlatform::new();
        let id = platform.create(marker(1.0, 2.0));
        assert!(!platform.handle(id).unwrap().attached);

        platform.set_attached(id, true);
        assert_eq!(platform.attached_handles(), vec![id]);

        platform.discard(id);
        let record = platform.handle(id).unwrap();
        assert!(record.discarded);
        assert!(platform.attached_handles().is_empty());
    }

    #[test]
    fn test_scripted_and_deferred_geocodes() {
        let platform = HeadlessPlatform::new();
        let request = GeocodeRequest::Address("Paris".to_string());
        let paris = GeocodeResult::new("Paris, France", LatLng::new(48.85, 2.35));
        platform.script_geocode(request.clone(), Ok(vec![paris.clone()]));

        assert_eq!(block_on(platform.geocode(request)), Ok(vec![paris]));
        assert_eq!(
            block_on(platform.geocode(GeocodeRequest::Address("nowhere".into()))),
            Err(GeocodeStatus::ZeroResults)
        );

        platform.defer_geocodes(true);
        let mut future = platform.geocode(GeocodeRequest::Location(LatLng::new(1.0, 1.0)));
        assert!((&mut future).now_or_never().is_none());
        assert_eq!(platform.pending_geocodes(), 1);

        platform.resolve_next_geocode(Err(GeocodeStatus::OverQueryLimit));
        assert_eq!(block_on(future), Err(GeocodeStatus::OverQueryLimit));
    }

    #[test]
    fn test_straight_line_directions() {
        let platform = HeadlessPlatform::new();
        let request = DirectionsRequest {
            origin: LatLng::new(0.0, 0.0),
            destination: LatLng::new(2.0, 2.0),
            waypoints: vec![super::super::Waypoint {
                location: LatLng::new(1.0, 1.0),
                stopover: true,
            }],
            travel_mode: TravelMode::Driving,
            avoid_ferries: false,
            avoid_highways: false,
            avoid_tolls: false,
            duration_in_traffic: false,
            optimize_waypoints: false,
            provide_route_alternatives: false,
        };

        let result = block_on(platform.route(request.clone())).unwrap();
        assert_eq!(result.path.len(), 3);

        platform.fail_directions(true);
        assert!(block_on(platform.route(request)).is_err());
        assert_eq!(platform.directions_requests().len(), 2);
    }
}
