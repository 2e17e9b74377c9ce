use geojson::FeatureCollection;
use landuse_map::engine::draw::DrawState;
use landuse_map::engine::events::SubscriptionKind;
use landuse_map::engine::tiles::TileId;
use landuse_map::engine::transforms::{MAX_LATITUDE, to_geographic, to_render};
use landuse_map::model::{Cursor, LayerSource, PixelPoint, PixelSize};
use landuse_map::{
    BoundingBox, DrawTrigger, GeoPoint, HeadlessSurface, LayerSlot, MapConfig, MapInputs, MapView,
    MapViewHandle, PointerEvent, SyncAction, TileSource,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

const SIZE: PixelSize = PixelSize {
    width: 800,
    height: 600,
};

fn collection(value: serde_json::Value) -> FeatureCollection {
    serde_json::from_value(value).unwrap()
}

fn point_collection(lon: f64, lat: f64) -> FeatureCollection {
    collection(json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [lon, lat] },
            "properties": {}
        }]
    }))
}

// A forest parcel around the initial view center
fn landuse_tile() -> FeatureCollection {
    collection(json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[10.0, 51.0], [10.5, 51.0], [10.5, 51.3], [10.0, 51.3], [10.0, 51.0]]]
            },
            "properties": {
                "name": "Hainich",
                "landuse_type": "forest",
                "osm_id": 4711,
                "area": 1234567.891
            }
        }]
    }))
}

fn ready_view() -> MapView<HeadlessSurface> {
    let mut view = MapView::new(MapConfig::default()).unwrap();
    assert!(view.initialize(SIZE, HeadlessSurface::default));
    view
}

fn recording(view: &mut MapView<HeadlessSurface>) -> Rc<RefCell<Vec<BoundingBox>>> {
    let boxes = Rc::new(RefCell::new(Vec::new()));
    let sink = boxes.clone();
    view.on_bounding_box_drawn(move |bbox| sink.borrow_mut().push(bbox));
    boxes
}

fn drag(view: &mut MapView<HeadlessSurface>, from: (f64, f64), to: (f64, f64)) {
    let (x0, y0) = from;
    let (x1, y1) = to;
    view.handle_pointer(PointerEvent::Down(PixelPoint::new(x0, y0))).unwrap();
    view.handle_pointer(PointerEvent::Move(PixelPoint::new((x0 + x1) / 2.0, (y0 + y1) / 2.0)))
        .unwrap();
    view.handle_pointer(PointerEvent::Move(PixelPoint::new(x1, y1))).unwrap();
    view.handle_pointer(PointerEvent::Up(PixelPoint::new(x1, y1))).unwrap();
}

fn center_click(view: &mut MapView<HeadlessSurface>) {
    view.handle_pointer(PointerEvent::Click(PixelPoint::new(400.0, 300.0)))
        .unwrap();
}

fn surface(view: &MapView<HeadlessSurface>) -> &HeadlessSurface {
    view.surface().unwrap()
}

fn show_landuse_tiles(view: &mut MapView<HeadlessSurface>) {
    view.show_tiled_overlay(TileSource::new("https://x/tiles.pmtiles"));
    view.load_tile_features(TileId::new(6, 33, 21).unwrap(), &landuse_tile())
        .unwrap();
}

#[test]
fn projection_round_trips() {
    for lon in [-180.0, -122.4, -0.5, 0.0, 10.21, 139.7, 180.0] {
        for lat in [-85.0, -33.9, 0.0, 1e-7, 51.14, 85.0] {
            let back = to_geographic(to_render(GeoPoint::new(lon, lat)).unwrap()).unwrap();
            assert!((back.lon - lon).abs() < 1e-9, "{} -> {:?}", lon, back);
            assert!((back.lat - lat).abs() < 1e-9, "{} -> {:?}", lat, back);
        }
    }
}

#[test]
fn projection_is_limited_to_the_mercator_band() {
    let back = to_geographic(to_render(GeoPoint::new(10.0, 88.0)).unwrap()).unwrap();
    assert!((back.lat - MAX_LATITUDE).abs() < 1e-9, "{:?}", back);
    assert!(to_render(GeoPoint::new(10.0, 90.5)).is_err());
}

#[test]
fn initialization_mounts_base_and_scratch_once() {
    let mut view = MapView::new(MapConfig::default()).unwrap();
    let created = Rc::new(RefCell::new(0));

    assert!(!view.initialize(PixelSize::new(0, 600), HeadlessSurface::default));
    assert!(!view.is_initialized());

    for _ in 0..3 {
        let created = created.clone();
        view.initialize(SIZE, move || {
            *created.borrow_mut() += 1;
            HeadlessSurface::default()
        });
    }
    assert_eq!(*created.borrow(), 1);

    let surface = surface(&view);
    assert_eq!(surface.layers_in(LayerSlot::Base).len(), 1);
    assert_eq!(surface.layers_in(LayerSlot::DrawScratch).len(), 1);
    assert!(view.subscriptions().has(SubscriptionKind::Resize));
    let camera = surface.camera().unwrap();
    assert_eq!(camera.size, SIZE);
    assert!((camera.zoom() - 6.0).abs() < 1e-9);
}

#[test]
fn vector_data_mounts_one_layer_and_fits_camera() {
    let mut view = ready_view();
    view.set_vector_data(Some(&point_collection(10.0, 51.0))).unwrap();

    let surface = surface(&view);
    assert_eq!(surface.layers_in(LayerSlot::DataOverlay).len(), 1);
    let (camera, duration) = surface.animations().last().copied().unwrap();
    assert_eq!(duration, Duration::from_millis(400));
    assert!(camera.center.x.is_finite() && camera.center.y.is_finite());
    let center = to_geographic(camera.center).unwrap();
    assert!((center.lon - 10.0).abs() < 1e-9 && (center.lat - 51.0).abs() < 1e-9);
    assert_eq!(view.camera(), &camera);
}

#[test]
fn empty_vector_data_leaves_camera_alone() {
    let mut view = ready_view();
    let before = *view.camera();
    view.set_vector_data(Some(&collection(json!({
        "type": "FeatureCollection",
        "features": []
    }))))
    .unwrap();

    assert_eq!(surface(&view).layers_in(LayerSlot::DataOverlay).len(), 1);
    assert!(surface(&view).animations().is_empty());
    assert_eq!(view.camera(), &before);

    view.set_vector_data(None).unwrap();
    assert!(surface(&view).layers_in(LayerSlot::DataOverlay).is_empty());
}

#[test]
fn drawn_box_is_emitted_once_in_lon_lat_order() {
    let mut view = ready_view();
    let boxes = recording(&mut view);

    view.request_draw();
    assert_eq!(surface(&view).cursor(), Cursor::Crosshair);
    drag(&mut view, (300.0, 400.0), (500.0, 200.0));

    let boxes = boxes.borrow();
    assert_eq!(boxes.len(), 1);
    let bbox = boxes[0];
    assert!(bbox.min_lon < bbox.max_lon, "{:?}", bbox);
    assert!(bbox.min_lat < bbox.max_lat, "{:?}", bbox);
    assert!(bbox.min_lon > 0.0 && bbox.max_lon < 20.0, "{:?}", bbox);
    assert!(bbox.min_lat > 45.0 && bbox.max_lat < 56.0, "{:?}", bbox);

    assert_eq!(view.draw_state(), DrawState::Idle);
    assert_eq!(surface(&view).cursor(), Cursor::Default);
    assert!(surface(&view).scratch().is_some());
    assert!(!view.subscriptions().has(SubscriptionKind::DrawInteraction));
}

#[test]
fn box_drawn_at_world_zoom_stays_on_the_globe() {
    let config = MapConfig {
        initial_zoom: 0.0,
        ..MapConfig::default()
    };
    let mut view = MapView::new(config).unwrap();
    assert!(view.initialize(SIZE, HeadlessSurface::default));
    let boxes = recording(&mut view);

    view.request_draw();
    drag(&mut view, (10.0, 200.0), (790.0, 400.0));

    let boxes = boxes.borrow();
    assert_eq!(boxes.len(), 1);
    let bbox = boxes[0];
    assert!(bbox.min_lon >= -180.0 && bbox.min_lon < bbox.max_lon && bbox.max_lon <= 180.0, "{:?}", bbox);
    assert!(bbox.min_lat >= -90.0 && bbox.min_lat < bbox.max_lat && bbox.max_lat <= 90.0, "{:?}", bbox);
    assert!((bbox.max_lon - 180.0).abs() < 1e-9, "{:?}", bbox);
}

#[test]
fn drawing_again_needs_a_new_request() {
    let mut view = ready_view();
    let boxes = recording(&mut view);
    let camera = *view.camera();

    view.request_draw();
    drag(&mut view, (100.0, 100.0), (200.0, 200.0));
    drag(&mut view, (300.0, 300.0), (400.0, 400.0));

    assert_eq!(boxes.borrow().len(), 1);
    // the second drag pans instead
    assert_ne!(view.camera().center, camera.center);
}

#[test]
fn rearming_discards_the_unfinished_box() {
    let mut view = ready_view();
    let boxes = recording(&mut view);

    view.request_draw();
    view.handle_pointer(PointerEvent::Down(PixelPoint::new(100.0, 100.0))).unwrap();
    view.handle_pointer(PointerEvent::Move(PixelPoint::new(150.0, 150.0))).unwrap();
    assert!(surface(&view).is_sketching());

    view.request_draw();
    assert_eq!(view.draw_state(), DrawState::Armed);
    assert_eq!(surface(&view).scratch(), None);
    assert!(boxes.borrow().is_empty());

    drag(&mut view, (400.0, 300.0), (600.0, 500.0));
    let boxes = boxes.borrow();
    assert_eq!(boxes.len(), 1);
    let expected = to_geographic(view.camera().pixel_to_render(PixelPoint::new(400.0, 300.0)))
        .unwrap();
    assert!((boxes[0].min_lon - expected.lon).abs() < 1e-9);
    assert!((boxes[0].max_lat - expected.lat).abs() < 1e-9);
}

#[test]
fn replacing_tiles_keeps_one_layer_from_the_latest_url() {
    let mut view = ready_view();
    view.show_tiled_overlay(TileSource::new("https://x/tiles.pmtiles"));
    view.show_tiled_overlay(TileSource::new("https://x/other.pmtiles"));

    let surface = surface(&view);
    let tiled = surface.layers_in(LayerSlot::TiledOverlay);
    assert_eq!(tiled.len(), 1);
    assert!(matches!(
        &tiled[0].source,
        LayerSource::Tiles(source) if source.url == "https://x/other.pmtiles"
    ));
    assert!(surface.max_layers_per_slot() <= 1);
    assert_eq!(view.subscriptions().count(SubscriptionKind::Click), 1);
}

#[test]
fn empty_tile_url_is_ignored() {
    let mut view = ready_view();
    view.show_tiled_overlay(TileSource::new(""));
    assert!(!view.layers().is_mounted(LayerSlot::TiledOverlay));
}

#[test]
fn clearing_a_box_that_was_never_drawn_is_a_no_op() {
    let mut view = ready_view();
    view.clear_drawn_box();
    assert_eq!(view.draw_state(), DrawState::Idle);
    assert_eq!(surface(&view).scratch(), None);
}

#[test]
fn clearing_the_box_keeps_the_tool_armed() {
    let mut view = ready_view();
    view.request_draw();
    view.clear_drawn_box();
    assert_eq!(view.draw_state(), DrawState::Armed);
    assert_eq!(surface(&view).cursor(), Cursor::Crosshair);
}

#[test]
fn click_on_tile_feature_opens_popup() {
    let mut view = ready_view();
    show_landuse_tiles(&mut view);
    center_click(&mut view);

    let popup = view.popup().unwrap();
    assert_eq!(popup.field("Name"), Some("Hainich"));
    assert_eq!(popup.field("Landuse"), Some("forest"));
    assert_eq!(popup.field("Leisure"), Some("-"));
    assert_eq!(popup.field("OSM ID"), Some("4711"));
    assert_eq!(popup.field("Area"), Some("1234567.89 m²"));
    assert_eq!(surface(&view).popup(), Some(popup));

    view.handle_pointer(PointerEvent::Click(PixelPoint::new(5.0, 5.0))).unwrap();
    assert!(view.popup().is_none());
}

#[test]
fn tiles_of_another_zoom_level_are_not_clickable() {
    let mut view = ready_view();
    show_landuse_tiles(&mut view);
    let zoom_at_center = |view: &mut MapView<HeadlessSurface>, delta: f64| {
        view.handle_pointer(PointerEvent::Wheel {
            at: PixelPoint::new(400.0, 300.0),
            delta,
        })
        .unwrap();
    };

    zoom_at_center(&mut view, 1.0);
    center_click(&mut view);
    assert!(view.popup().is_none());
    assert_eq!(surface(&view).cached_tiles(), 1);

    zoom_at_center(&mut view, -1.0);
    center_click(&mut view);
    assert_eq!(view.popup().unwrap().field("Name"), Some("Hainich"));
}

#[test]
fn clicks_without_tiled_overlay_never_open_popups() {
    let mut view = ready_view();
    view.set_vector_data(Some(&landuse_tile())).unwrap();
    center_click(&mut view);
    assert!(view.popup().is_none());
    assert!(surface(&view).popup().is_none());
}

#[test]
fn clearing_tiles_closes_the_popup() {
    let mut view = ready_view();
    show_landuse_tiles(&mut view);
    center_click(&mut view);
    assert!(view.popup().is_some());

    view.clear_tiled_overlay();
    assert!(view.popup().is_none());
    assert!(surface(&view).popup().is_none());
    assert!(!view.subscriptions().has(SubscriptionKind::Click));
    assert_eq!(surface(&view).cached_tiles(), 0);

    view.load_tile_features(TileId::new(6, 33, 21).unwrap(), &landuse_tile())
        .unwrap();
    assert_eq!(surface(&view).cached_tiles(), 0);

    center_click(&mut view);
    assert!(view.popup().is_none());
}

#[test]
fn clicks_are_ignored_while_drawing() {
    let mut view = ready_view();
    show_landuse_tiles(&mut view);

    view.request_draw();
    center_click(&mut view);
    assert!(view.popup().is_none());

    view.handle_pointer(PointerEvent::Down(PixelPoint::new(390.0, 290.0))).unwrap();
    center_click(&mut view);
    assert!(view.popup().is_none());

    view.reset_cursor();
    assert_eq!(view.draw_state(), DrawState::Idle);
    assert_eq!(surface(&view).cursor(), Cursor::Default);
    center_click(&mut view);
    assert!(view.popup().is_some());
}

#[test]
fn reconcile_applies_only_changes() {
    let mut view = MapView::new(MapConfig::default()).unwrap();
    let data = Arc::new(point_collection(13.4, 52.5));
    let inputs = MapInputs {
        vector_data: Some(data.clone()),
        tile_source_url: Some("https://x/tiles.pmtiles?v=1".to_string()),
        draw_trigger: DrawTrigger(0),
    };

    assert!(view.reconcile(inputs.clone()).unwrap().is_empty());
    assert!(view.layers().is_empty());

    view.initialize(SIZE, HeadlessSurface::default);
    assert!(view.layers().is_mounted(LayerSlot::DataOverlay));
    assert!(view.layers().is_mounted(LayerSlot::TiledOverlay));

    assert!(view.reconcile(inputs.clone()).unwrap().is_empty());
    assert_eq!(surface(&view).animations().len(), 1);

    let armed = MapInputs {
        draw_trigger: DrawTrigger(1_700_000_000_000),
        ..inputs.clone()
    };
    assert_eq!(view.reconcile(armed.clone()).unwrap(), vec![SyncAction::ArmDraw]);
    assert_eq!(view.draw_state(), DrawState::Armed);

    let cleared = MapInputs {
        tile_source_url: None,
        draw_trigger: DrawTrigger(0),
        ..armed
    };
    assert_eq!(
        view.reconcile(cleared).unwrap(),
        vec![SyncAction::ClearTiles, SyncAction::CancelDraw]
    );
    assert_eq!(view.draw_state(), DrawState::Idle);
    assert!(!view.layers().is_mounted(LayerSlot::TiledOverlay));
    assert!(view.layers().is_mounted(LayerSlot::DataOverlay));
}

#[test]
fn pan_and_wheel_move_the_camera() {
    let mut view = ready_view();
    let start = *view.camera();

    view.handle_pointer(PointerEvent::Down(PixelPoint::new(400.0, 300.0))).unwrap();
    assert_eq!(surface(&view).cursor(), Cursor::Grabbing);
    view.handle_pointer(PointerEvent::Move(PixelPoint::new(410.0, 300.0))).unwrap();
    view.handle_pointer(PointerEvent::Up(PixelPoint::new(410.0, 300.0))).unwrap();
    assert_eq!(surface(&view).cursor(), Cursor::Default);
    assert!((view.camera().center.x - (start.center.x - 10.0 * start.resolution)).abs() < 1e-6);

    view.handle_pointer(PointerEvent::Wheel {
        at: PixelPoint::new(400.0, 300.0),
        delta: 1.0,
    })
    .unwrap();
    assert!((view.camera().zoom() - 7.0).abs() < 1e-9);
    assert!(surface(&view).animations().is_empty());
}

#[test]
fn resize_updates_camera_size() {
    let mut view = ready_view();
    view.resize(PixelSize::new(1024, 768));
    assert_eq!(view.camera().size, PixelSize::new(1024, 768));
    assert_eq!(surface(&view).camera().unwrap().size, PixelSize::new(1024, 768));

    view.resize(PixelSize::new(0, 0));
    assert_eq!(view.camera().size, PixelSize::new(1024, 768));
}

#[test]
fn visible_tiles_follow_the_camera() {
    let mut view = ready_view();
    assert!(view.visible_tiles().is_empty());
    view.show_tiled_overlay(TileSource::new("https://x/tiles.pmtiles"));
    let tiles = view.visible_tiles();
    assert!(!tiles.is_empty());
    assert!(tiles.iter().all(|tile| tile.z == 6));
    assert!(tiles.contains(&TileId::new(6, 33, 21).unwrap()));
}

#[test]
fn dispose_releases_everything() {
    let mut view = ready_view();
    let boxes = recording(&mut view);
    show_landuse_tiles(&mut view);
    view.request_draw();
    assert!(view.subscriptions().len() >= 3);

    view.dispose();
    assert!(view.subscriptions().is_empty());
    assert!(view.layers().is_empty());
    assert!(!view.is_initialized());

    view.dispose();
    view.resize(SIZE);
    view.request_draw();
    drag(&mut view, (100.0, 100.0), (200.0, 200.0));
    assert!(boxes.borrow().is_empty());
    assert!(!view.initialize(SIZE, HeadlessSurface::default));
}
