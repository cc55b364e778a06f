use leaflet_compose::engine::interaction::{Hit, hit_test};
use leaflet_compose::engine::renderer::Placement;
use leaflet_compose::engine::stack::LayerStack;
use leaflet_compose::engine::transforms::{project, unproject};
use leaflet_compose::engine::viewport::ZoomRange;
use leaflet_compose::model::MarkerLayer;
use leaflet_compose::{GeoPoint, Layer, LayerKey, MapConfig, MapEngine, PixelPoint, Viewport};
use pretty_assertions::assert_eq;

const FLOOD_MAP: &str = r##"{
    "center": [20.5937, 78.9629],
    "zoom": 5,
    "tile": {
        "url_template": "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
        "attribution": "&copy; OpenStreetMap contributors"
    },
    "overlays": [
        {"key": "flood", "url": "/overlay2.png", "bounds": [[5.5546, 65.45], [35.18, 98.98]], "opacity": 0.6}
    ],
    "vector_layers": [
        {"key": "zones", "style": {"stroke_color": "red", "weight": 2.0, "fill_opacity": 0.3},
         "data": {"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"name": "My Polygon"},
             "geometry": {"type": "Polygon", "coordinates": [[[77.0, 20.0], [78.0, 21.0], [76.0, 21.5], [77.0, 20.0]]]}}
         ]}}
    ],
    "markers": [
        {"key": "kerala", "position": [10.8505, 76.2711], "popup": "Kerala"},
        {"key": "amravati", "position": [20.91, 77.75], "popup": "[Custom icon popup]\nAmravati",
         "icon": {"url": "/map_icon.png", "size": [32, 32], "anchor": [16, 48], "popup_anchor": [0, -48]}}
    ],
    "legend": {
        "title": "Flood Risk Legend",
        "entries": [
            {"label": "Severe", "swatch": "red"},
            {"label": "Moderate", "swatch": "orange"},
            {"label": "Low", "swatch": "yellow"},
            {"label": "Safe", "swatch": "green"},
            {"label": "No Data", "swatch": "white", "border": "#aaa"}
        ]
    }
}"##;

fn geo(lat: f64, lng: f64) -> GeoPoint {
    GeoPoint::new(lat, lng).unwrap()
}

#[test]
fn marker_over_india_is_hit_at_its_projected_pixel() {
    let viewport = Viewport::new(geo(20.5937, 78.9629), 5, 800, 600).unwrap();
    let mut stack = LayerStack::new();
    stack
        .add(Layer::new("amravati", MarkerLayer::new(geo(20.91, 77.75), "Amravati")))
        .unwrap();

    let pixel = project(geo(20.91, 77.75), &viewport).unwrap();
    assert!((pixel.x - 372.40).abs() < 0.01);
    assert!((pixel.y - 292.30).abs() < 0.01);

    let hit = hit_test(&pixel, &stack, &viewport);
    assert_eq!(hit, Some(LayerKey::from("amravati")));

    let mut engine = MapEngine::new(viewport, ZoomRange::default()).unwrap();
    engine
        .add_layer(Layer::new("amravati", MarkerLayer::new(geo(20.91, 77.75), "Amravati")))
        .unwrap();

    let outcome = engine.click(pixel);
    assert_eq!(
        outcome.hit,
        Some(Hit::Marker {
            key: LayerKey::from("amravati")
        })
    );
    assert_eq!(outcome.popup, Some(LayerKey::from("amravati")));
    assert_eq!(engine.popup_content(), Some("Amravati"));

    // a second click on the same marker closes it
    assert_eq!(engine.click(pixel).popup, None);
}

#[test]
fn round_trip_holds_across_the_band() {
    for zoom in [0, 3, 9, 17] {
        let viewport = Viewport::new(geo(-12.0, 140.0), zoom, 1024, 768).unwrap();
        for (lat, lng) in [(84.9, -179.5), (-84.9, 179.5), (0.0, 0.0), (51.5074, -0.1278)] {
            let back = unproject(project(geo(lat, lng), &viewport).unwrap(), &viewport).unwrap();
            assert!((back.lat() - lat).abs() < 1e-9, "lat {lat} at zoom {zoom}");
            assert!((back.lng() - lng).abs() < 1e-9, "lng {lng} at zoom {zoom}");
        }
    }
}

#[test]
fn flood_map_composes_every_layer() {
    let config = MapConfig::from_json(FLOOD_MAP).unwrap();
    let (engine, report) = MapEngine::from_config(&config).unwrap();
    assert!(report.is_clean());

    let frame = engine.frame();
    let keys: Vec<_> = frame.placements.iter().map(|p| p.key().as_str()).collect();
    assert_eq!(keys, vec!["base", "flood", "zones", "kerala", "amravati"]);

    let legend = frame.legend.as_ref().unwrap();
    assert_eq!(legend.rows.len(), 5);
    assert_eq!(legend.bounds.min_x, 10.0);
    assert_eq!(legend.bounds.max_y, 570.0);
}

#[test]
fn clicking_the_custom_icon_shows_its_popup_above_it() {
    let config = MapConfig::from_json(FLOOD_MAP).unwrap();
    let (mut engine, _) = MapEngine::from_config(&config).unwrap();
    let anchor = project(geo(20.91, 77.75), &engine.viewport()).unwrap();

    // the icon box spans 48px to 16px above the point
    let outcome = engine.click(anchor.offset(0.0, -30.0));
    assert_eq!(outcome.popup, Some(LayerKey::from("amravati")));
    assert_eq!(engine.popup_content(), Some("[Custom icon popup]\nAmravati"));

    let frame = engine.frame();
    let popup = frame.open_popup().unwrap();
    assert_eq!(popup.origin, anchor.offset(0.0, -48.0));

    // clicking the map elsewhere dismisses it
    engine.click(PixelPoint::new(700.0, 100.0));
    assert_eq!(engine.popup().open_key(), None);
}

#[test]
fn legend_stays_put_while_the_map_moves() {
    let config = MapConfig::from_json(FLOOD_MAP).unwrap();
    let (mut engine, _) = MapEngine::from_config(&config).unwrap();
    let before = engine.frame();

    engine.pan(-150.0, 80.0).unwrap();
    engine.set_zoom(7).unwrap();
    let after = engine.frame();

    assert_eq!(before.legend, after.legend);
    let overlay_bounds = |frame: &leaflet_compose::engine::renderer::Frame| match frame.placement(&"flood".into()) {
        Some(Placement::ImageOverlay { bounds, .. }) => *bounds,
        other => panic!("unexpected overlay placement {other:?}"),
    };
    assert_ne!(overlay_bounds(&before), overlay_bounds(&after));
}
