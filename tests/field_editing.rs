use mapfield::prelude::*;

/// Editing scenarios driven through the public surface API against the
/// in-memory platform.
#[cfg(test)]
mod field_editing {
    use super::*;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn surface(value: Option<&str>) -> (Arc<HeadlessPlatform>, MapSurface) {
        init_logging();
        let platform = Arc::new(HeadlessPlatform::new());
        let surface = MapSurface::load(
            MapFieldConfig::new("location_map"),
            Services::headless(platform.clone()),
            value,
        )
        .unwrap();
        (platform, surface)
    }

    fn marker_attrs(lat: f64, lng: f64, address: &str) -> MarkerAttrs {
        MarkerAttrs {
            address: address.to_string(),
            ..MarkerAttrs::at(LatLng::new(lat, lng))
        }
    }

    fn value_of(document: &FieldDocument) -> String {
        serde_json::to_string(document).unwrap()
    }

    fn one_marker(lat: f64, lng: f64, address: &str) -> String {
        value_of(&FieldDocument {
            markers: vec![marker_attrs(lat, lng, address)],
            ..Default::default()
        })
    }

    fn marker_ref(surface: &MapSurface, index: usize) -> OverlayRef {
        OverlayRef::new(OverlayKind::Marker, surface.overlays().markers[index].id())
    }

    fn stops(points: &[(f64, f64)]) -> Vec<Location> {
        points
            .iter()
            .map(|&(lat, lng)| Location::new(LatLng::new(lat, lng), format!("{lat},{lng}")))
            .collect()
    }

    fn one_route(points: &[(f64, f64)], deleted: bool) -> String {
        let mut route = RouteAttrs {
            locations: stops(points),
            ..Default::default()
        };
        route.common.deleted = deleted;
        value_of(&FieldDocument {
            routes: vec![route],
            ..Default::default()
        })
    }

    fn route_ref(surface: &MapSurface, index: usize) -> OverlayRef {
        OverlayRef::new(OverlayKind::Route, surface.overlays().routes[index].id())
    }

    fn route_is_shown(platform: &HeadlessPlatform, route: &Route) -> bool {
        let attached = platform.attached_handles();
        attached.contains(&route.id())
            && route
                .markers()
                .iter()
                .all(|marker| attached.contains(&marker.id()))
    }

    #[test]
    fn test_empty_field_serializes_every_collection() {
        let (_, surface) = surface(None);

        let value: serde_json::Value = serde_json::from_str(surface.field().value()).unwrap();
        for key in ["markers", "polygons", "polylines", "routes", "circles", "groundOverlays"] {
            assert_eq!(value[key], serde_json::json!([]), "{key}");
        }
        assert_eq!(surface.field().name(), "location_map");
        assert_eq!(surface.field().revision(), 1);
    }

    #[test]
    fn test_persisted_value_round_trips() {
        let document = FieldDocument {
            markers: vec![marker_attrs(59.91, 10.74, "Oslo")],
            polygons: vec![PolygonAttrs {
                points: vec![
                    LatLng::new(1.0, 1.0),
                    LatLng::new(1.0, 2.0),
                    LatLng::new(2.0, 2.0),
                ],
                ..Default::default()
            }],
            circles: vec![CircleAttrs {
                lat: 5.0,
                lng: 5.0,
                radius: 3.0,
                metric: Metric::Kilometers,
                ..Default::default()
            }],
            routes: vec![RouteAttrs {
                locations: vec![
                    Location::new(LatLng::new(1.0, 1.0), "Start"),
                    Location::new(LatLng::new(3.0, 3.0), "End"),
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        let (_, first) = surface(Some(&value_of(&document)));
        let (_, second) = surface(Some(first.field().value()));

        assert_eq!(first.field().value(), second.field().value());
        let reloaded = second.field().document().unwrap();
        assert_eq!(reloaded.markers[0].address, "Oslo");
        assert_eq!(reloaded.polygons[0].points.len(), 3);
        assert_eq!(reloaded.circles[0].metric, Metric::Kilometers);
        assert_eq!(reloaded.circles[0].radius, 3.0);
        assert_eq!(reloaded.routes[0].locations.len(), 2);
        assert!(reloaded.markers[0].common.is_saved_to_map);
    }

    #[test]
    fn test_soft_delete_and_undo() {
        let (platform, mut surface) = surface(Some(&one_marker(10.0, 20.0, "A")));
        let reference = marker_ref(&surface, 0);
        let before = surface.field().value().to_string();

        surface.delete(reference, false).unwrap();
        assert!(surface.overlays().markers[0].is_deleted());
        assert!(!platform.attached_handles().contains(&reference.id));
        assert!(surface.field().document().unwrap().markers[0].common.deleted);

        surface.undo(reference).unwrap();
        assert!(!surface.overlays().markers[0].is_deleted());
        assert!(platform.attached_handles().contains(&reference.id));
        assert_eq!(surface.field().value(), before);
    }

    #[test]
    fn test_route_delete_and_undo() {
        let (platform, mut surface) = surface(Some(&one_route(&[(1.0, 1.0), (2.0, 2.0)], false)));
        assert_eq!(surface.pump().unwrap(), 1);
        let reference = route_ref(&surface, 0);
        assert!(route_is_shown(&platform, &surface.overlays().routes[0]));

        surface.delete(reference, false).unwrap();
        let route = &surface.overlays().routes[0];
        assert!(!platform.attached_handles().contains(&route.id()));
        assert!(route
            .markers()
            .iter()
            .all(|marker| !platform.attached_handles().contains(&marker.id())));

        surface.undo(reference).unwrap();
        surface.pump().unwrap();
        let route = &surface.overlays().routes[0];
        assert!(!route.base().is_deleted());
        assert_eq!(route.path().len(), 2);
        assert!(route_is_shown(&platform, route));
    }

    #[test]
    fn test_deleted_route_reloads_and_redraws_after_undo() {
        let (_, mut surface) = surface(Some(&one_route(&[(1.0, 1.0), (2.0, 2.0)], false)));
        surface.pump().unwrap();
        surface.delete(route_ref(&surface, 0), false).unwrap();
        assert!(surface.field().document().unwrap().routes[0].common.deleted);

        let (platform, mut reloaded) = self::surface(Some(surface.field().value()));
        assert_eq!(reloaded.pump().unwrap(), 0);
        assert!(platform.directions_requests().is_empty());
        let reference = route_ref(&reloaded, 0);
        assert!(!platform.attached_handles().contains(&reference.id));

        reloaded.undo(reference).unwrap();
        assert_eq!(platform.directions_requests().len(), 1);
        assert_eq!(reloaded.pump().unwrap(), 1);

        let route = &reloaded.overlays().routes[0];
        assert_eq!(
            route.path(),
            &[LatLng::new(1.0, 1.0), LatLng::new(2.0, 2.0)][..]
        );
        assert!(route_is_shown(&platform, route));
        assert!(!reloaded.field().document().unwrap().routes[0].common.deleted);
    }

    #[test]
    fn test_cancel_edit_of_saved_route() {
        let points = [(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)];
        let (platform, mut surface) = surface(Some(&one_route(&points, false)));
        surface.pump().unwrap();
        let reference = route_ref(&surface, 0);
        let before = surface.field().value().to_string();
        let original: Vec<_> = surface.overlays().routes[0]
            .markers()
            .iter()
            .map(|marker| marker.id())
            .collect();

        surface.edit(reference, false).unwrap();
        let added = {
            let mut form = surface.route_form().unwrap();
            form.remove_location(1).unwrap();
            form.add_location(LatLng::new(9.0, 9.0)).unwrap();
            form.set_travel_mode(TravelMode::Walking).unwrap();
            let route = form.route().unwrap();
            assert_eq!(route.locations().len(), 3);
            route.markers()[2].id()
        };
        let requests_before_cancel = platform.directions_requests().len();

        surface.cancel_session().unwrap();
        assert!(surface.session().is_none());
        let route = &surface.overlays().routes[0];
        let positions: Vec<_> = route.locations().iter().map(|l| (l.lat, l.lng)).collect();
        assert_eq!(positions, points.to_vec());
        assert_eq!(route.options().travel_mode, TravelMode::Driving);
        let ids: Vec<_> = route.markers().iter().map(|marker| marker.id()).collect();
        assert_eq!(ids, original);
        assert!(platform.handle(added).unwrap().discarded);
        assert_eq!(surface.field().value(), before);

        let requests = platform.directions_requests();
        assert_eq!(requests.len(), requests_before_cancel + 1);
        let last = requests.last().unwrap();
        assert_eq!(last.waypoints.len(), 1);
        assert_eq!(last.travel_mode, TravelMode::Driving);

        surface.pump().unwrap();
        let route = &surface.overlays().routes[0];
        assert_eq!(route.path().len(), 3);
        assert!(route_is_shown(&platform, route));
    }

    #[test]
    fn test_deleted_overlay_reloads_hidden() {
        let (_, mut surface) = surface(Some(&one_marker(10.0, 20.0, "A")));
        let reference = marker_ref(&surface, 0);
        surface.delete(reference, false).unwrap();

        let (platform, reloaded) = self::surface(Some(surface.field().value()));
        let marker = &reloaded.overlays().markers[0];
        assert!(marker.is_deleted());
        assert!(!platform.attached_handles().contains(&marker.id()));
        assert_eq!(platform.viewport(), Default::default());
    }

    #[test]
    fn test_single_point_centers_with_fixed_zoom() {
        let (platform, _surface) = surface(Some(&one_marker(10.0, 20.0, "A")));
        let viewport = platform.viewport();
        assert_eq!(viewport.center, Some(LatLng::new(10.0, 20.0)));
        assert_eq!(viewport.zoom, Some(14.0));
        assert_eq!(viewport.fitted, None);
    }

    #[test]
    fn test_several_overlays_fit_bounds() {
        let document = FieldDocument {
            markers: vec![marker_attrs(10.0, 20.0, "A"), marker_attrs(12.0, 25.0, "B")],
            ..Default::default()
        };
        let (platform, _surface) = surface(Some(&value_of(&document)));
        let fitted = platform.viewport().fitted.unwrap();
        assert!(fitted.contains(&LatLng::new(10.0, 20.0)));
        assert!(fitted.contains(&LatLng::new(12.0, 25.0)));
    }

    #[test]
    fn test_second_session_is_refused() {
        let (_, mut surface) = surface(None);
        surface.add_marker().unwrap();

        let err = surface.add_circle().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MapError>(),
            Some(MapError::SessionAlreadyOpen)
        ));
        surface.cancel_session().unwrap();
        assert!(surface.add_circle().is_ok());
    }

    #[test]
    fn test_cancel_new_overlay_leaves_nothing_behind() {
        let (platform, mut surface) = surface(None);
        let before = surface.field().value().to_string();

        surface.add_polygon().unwrap();
        {
            let mut form = surface.polygon_form().unwrap();
            form.add_point(LatLng::new(1.0, 1.0)).unwrap();
            form.add_point(LatLng::new(1.0, 2.0)).unwrap();
            form.add_point(LatLng::new(2.0, 2.0)).unwrap();
        }
        surface.cancel_session().unwrap();

        assert!(surface.overlays().is_empty());
        assert!(platform.attached_handles().is_empty());
        assert_eq!(surface.field().value(), before);
        assert!(!surface.modal().is_open());
    }

    #[test]
    fn test_commit_new_marker() {
        let (platform, mut surface) = surface(None);
        platform.script_geocode(
            GeocodeRequest::Location(LatLng::new(48.85, 2.35)),
            Ok(vec![GeocodeResult::new("Rue de Rivoli, Paris, France", LatLng::new(48.85, 2.35))]),
        );

        surface.add_marker().unwrap();
        assert!(surface.modal().is_open());
        surface
            .handle_event(PlatformEvent::MapClick {
                position: LatLng::new(48.85, 2.35),
            })
            .unwrap();
        surface.marker_form().unwrap().set_title("Office").unwrap();
        assert_eq!(surface.pump().unwrap(), 1);

        let reference = surface.commit_session().unwrap().unwrap();
        assert_eq!(reference.kind, OverlayKind::Marker);
        let saved = &surface.field().document().unwrap().markers[0];
        assert_eq!(saved.common.title, "Office");
        assert_eq!(saved.address, "Rue de Rivoli, Paris, France");
        assert_eq!(saved.common.content.lines(), vec!["Rue de Rivoli", "Paris", "France"]);
        assert!(saved.common.is_saved_to_map);
        assert_eq!(
            platform.handle(reference.id).unwrap().interaction,
            Interaction::frozen()
        );
    }

    #[test]
    fn test_cancel_restores_circle() {
        let document = FieldDocument {
            circles: vec![CircleAttrs {
                lat: 1.0,
                lng: 1.0,
                radius: 100.0,
                metric: Metric::Miles,
                ..Default::default()
            }],
            ..Default::default()
        };
        let (_, mut surface) = surface(Some(&value_of(&document)));
        let before = surface.field().value().to_string();
        let reference = OverlayRef::new(OverlayKind::Circle, surface.overlays().circles[0].id());

        surface.edit(reference, false).unwrap();
        {
            let mut form = surface.circle_form().unwrap();
            form.set_radius(500.0).unwrap();
            form.set_metric(Metric::Kilometers).unwrap();
        }
        surface.cancel_session().unwrap();

        let circle = surface.overlays().circles[0].attrs();
        assert_eq!(circle.radius, 100.0);
        assert_eq!(circle.metric, Metric::Miles);
        assert_eq!(surface.field().value(), before);
    }

    #[test]
    fn test_setting_same_radius_changes_nothing() {
        let (_, mut surface) = surface(None);
        surface.add_circle().unwrap();
        let mut form = surface.circle_form().unwrap();

        assert_eq!(form.set_radius(5.0).unwrap(), vec!["radius".to_string()]);
        assert!(form.set_radius(5.0).unwrap().is_empty());
        assert!(form.set_radius(-1.0).is_err());
    }

    #[test]
    fn test_resizing_handle_is_written_back() {
        let (_, mut surface) = surface(None);
        surface.add_circle().unwrap();
        let reference = surface.commit_session().unwrap().unwrap();
        let revision = surface.field().revision();

        surface
            .handle_event(PlatformEvent::RadiusChanged {
                handle: reference.id,
                meters: 1000.0,
            })
            .unwrap();
        let circle = surface.overlays().circles[0].attrs();
        assert!((circle.radius - Metric::Miles.from_meters(1000.0)).abs() < 1e-9);
        assert_eq!(surface.field().revision(), revision + 1);
    }

    #[test]
    fn test_marker_drag_then_cancel_reverts_everything() {
        let (platform, mut surface) = surface(Some(&one_marker(10.0, 20.0, "A")));
        platform.script_geocode(
            GeocodeRequest::Location(LatLng::new(11.0, 21.0)),
            Ok(vec![GeocodeResult::new("X", LatLng::new(11.0, 21.0))]),
        );
        let before = surface.field().value().to_string();
        let reference = marker_ref(&surface, 0);

        surface.edit(reference, false).unwrap();
        assert_eq!(
            platform.handle(reference.id).unwrap().interaction,
            Interaction::editing()
        );
        let handled = surface
            .handle_event(PlatformEvent::DragEnd {
                handle: reference.id,
                position: LatLng::new(11.0, 21.0),
            })
            .unwrap();
        assert_eq!(handled, EventHandled::Handled);
        assert_eq!(surface.pump().unwrap(), 1);
        assert_eq!(surface.overlays().markers[0].attrs().address, "X");

        surface.cancel_session().unwrap();
        let marker = surface.overlays().markers[0].attrs();
        assert_eq!(marker.position(), LatLng::new(10.0, 20.0));
        assert_eq!(marker.address, "A");
        assert_eq!(surface.field().value(), before);
        assert_eq!(
            platform.handle(reference.id).unwrap().interaction,
            Interaction::frozen()
        );
    }

    #[test]
    fn test_route_keeps_one_marker_per_location() {
        let (platform, mut surface) = surface(None);
        surface.add_route().unwrap();
        {
            let mut form = surface.route_form().unwrap();
            form.add_location(LatLng::new(1.0, 1.0)).unwrap();
            form.add_location(LatLng::new(2.0, 2.0)).unwrap();
            form.add_location(LatLng::new(3.0, 3.0)).unwrap();
        }
        let reference = surface.commit_session().unwrap().unwrap();
        surface.pump().unwrap();

        let route = &surface.overlays().routes[0];
        assert_eq!(route.id(), reference.id);
        assert_eq!(route.markers().len(), route.locations().len());
        assert_eq!(route.waypoints().len(), 1);
        assert_eq!(route.state(), RouteState::Routed);
        assert_eq!(
            route.path(),
            &[LatLng::new(1.0, 1.0), LatLng::new(2.0, 2.0), LatLng::new(3.0, 3.0)]
        );
        assert!(platform.attached_handles().contains(&reference.id));
    }

    #[test]
    fn test_route_refuses_too_many_locations() {
        let (_, mut surface) = surface(None);
        let max = surface.config().route.max_locations;
        surface.add_route().unwrap();
        let mut form = surface.route_form().unwrap();
        for step in 0..max {
            form.add_location(LatLng::new(step as f64, 0.0)).unwrap();
        }
        let err = form.add_location(LatLng::new(-1.0, 0.0)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MapError>(),
            Some(MapError::RouteFull { .. })
        ));
    }

    #[test]
    fn test_review_list_actions() {
        let document = FieldDocument {
            markers: vec![marker_attrs(10.0, 20.0, "A"), marker_attrs(12.0, 25.0, "B")],
            ..Default::default()
        };
        let (_, mut surface) = surface(Some(&value_of(&document)));
        let first = marker_ref(&surface, 0);
        let second = marker_ref(&surface, 1);

        let mut list = surface.list_view();
        assert_eq!(list.rows().len(), 2);
        assert_eq!(list.rows()[0].title, "Untitled marker");
        list.delete(first).unwrap();
        assert!(list.rows()[0].deleted);
        list.undo(first).unwrap();
        assert!(!list.rows()[0].deleted);
        list.permanently_delete(second).unwrap();
        assert_eq!(list.rows().len(), 1);
        assert!(list.render().unwrap().contains("overlay-list"));

        assert_eq!(surface.modal().content(), Some(ModalContent::OverlayList));
        assert_eq!(surface.field().document().unwrap().markers.len(), 1);
    }

    #[test]
    fn test_edit_from_list_returns_to_list() {
        let (_, mut surface) = surface(Some(&one_marker(10.0, 20.0, "A")));
        let reference = marker_ref(&surface, 0);
        surface.show_list().unwrap();

        surface.list_view().edit(reference).unwrap();
        assert!(matches!(
            surface.modal().content(),
            Some(ModalContent::Session(_))
        ));
        let err = surface.list_view().delete(reference).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MapError>(),
            Some(MapError::SessionAlreadyOpen)
        ));

        surface.commit_session().unwrap();
        assert_eq!(surface.modal().content(), Some(ModalContent::OverlayList));
    }

    #[test]
    fn test_click_opens_only_that_popup() {
        let document = FieldDocument {
            markers: vec![marker_attrs(10.0, 20.0, "A"), marker_attrs(12.0, 25.0, "B")],
            ..Default::default()
        };
        let (platform, mut surface) = surface(Some(&value_of(&document)));
        let first = marker_ref(&surface, 0);
        let second = marker_ref(&surface, 1);

        surface
            .handle_event(PlatformEvent::Click { handle: first.id })
            .unwrap();
        assert!(platform.handle(first.id).unwrap().popup.is_some());

        surface
            .handle_event(PlatformEvent::Click { handle: second.id })
            .unwrap();
        assert!(platform.handle(first.id).unwrap().popup.is_none());
        assert!(platform.handle(second.id).unwrap().popup.is_some());
    }

    #[test]
    fn test_popup_delete_action() {
        let (_, mut surface) = surface(Some(&one_marker(10.0, 20.0, "A")));
        let reference = marker_ref(&surface, 0);
        let action = PopupAction::from_name("delete").unwrap();

        surface.popup_action(reference, action).unwrap();
        assert!(surface.overlays().markers[0].is_deleted());
    }

    #[test]
    fn test_unknown_overlay_cannot_be_edited() {
        let (_, mut surface) = surface(None);
        let missing = OverlayRef::new(OverlayKind::Polygon, HandleId(404));
        let err = surface.edit(missing, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MapError>(),
            Some(MapError::UnknownOverlay(_))
        ));
        assert!(surface.session().is_none());
    }
}
