use leaflet_compose::{MapConfig, logging, view::view::MapView};
use wasm_bindgen::prelude::wasm_bindgen;

const FLOOD_RISK_MAP: &str = include_str!("../flood_risk.json");

#[wasm_bindgen(start)]
pub fn main() -> Result<(), wasm_bindgen::JsValue> {
    logging::init();
    let config = MapConfig::from_json(FLOOD_RISK_MAP)?;
    let map_view = MapView::from_config(&config)?;

    map_view.render_to_canvas("canvas")?;
    tracing::info!("Flood risk map ready");
    Ok(())
}
