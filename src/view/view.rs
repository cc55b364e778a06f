use crate::config::MapConfig;
use crate::engine::MapEngine;
use crate::engine::assets::AssetTicket;
use crate::engine::renderer::paint_frame;
use crate::error::MapError;
use crate::model::{MapResult, PixelPoint};
use std::cell::RefCell;
use std::collections::HashMap;
use web_sys::HtmlImageElement;
use web_sys::wasm_bindgen::JsCast;

/// Browser handle around a [`MapEngine`] that paints its frames to a 2D canvas.
#[wasm_bindgen::prelude::wasm_bindgen]
pub struct MapView {
    engine: MapEngine,
    images: RefCell<HashMap<String, HtmlImageElement>>,
}

impl MapView {
    pub fn new(engine: MapEngine) -> Self {
        MapView {
            engine,
            images: RefCell::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &MapConfig) -> MapResult<Self> {
        let (engine, report) = MapEngine::from_config(config)?;
        for (key, err) in &report.rejected {
            tracing::warn!("Map view left out layer {}: {}", key, err);
        }
        Ok(MapView::new(engine))
    }

    pub fn engine(&self) -> &MapEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut MapEngine {
        &mut self.engine
    }

    // Cached image element for `url`; the browser starts loading it on first use.
    fn image(&self, url: &str) -> Option<HtmlImageElement> {
        let mut images = self.images.borrow_mut();
        if let Some(image) = images.get(url) {
            return Some(image.clone());
        }
        let image = HtmlImageElement::new().ok()?;
        image.set_src(url);
        images.insert(url.to_string(), image.clone());
        Some(image)
    }

    pub fn render_to_canvas(&self, canvas_id: &str) -> MapResult<()> {
        let document = web_sys::window()
            .ok_or_else(|| MapError::Wasm("No window".to_string()))?
            .document()
            .ok_or_else(|| MapError::Wasm("No document".to_string()))?;

        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| MapError::Wasm(format!("Canvas {} not found", canvas_id)))?
            .dyn_into::<web_sys::HtmlCanvasElement>()
            .map_err(|_| MapError::Wasm("Element is not a canvas".to_string()))?;

        let context = canvas
            .get_context("2d")
            .map_err(|_| MapError::Wasm("Could not get 2d context".to_string()))?
            .ok_or_else(|| MapError::Wasm("No 2d context".to_string()))?
            .dyn_into::<web_sys::CanvasRenderingContext2d>()
            .map_err(|_| MapError::Wasm("Context is not 2d".to_string()))?;

        let frame = self.engine.frame();
        paint_frame(&frame, &context, &|url: &str| self.image(url))?;

        let viewport = frame.viewport;
        tracing::debug!(
            "Rendered {} layers to canvas {} at {} zoom {}",
            frame.placements.len(),
            canvas_id,
            viewport.center(),
            viewport.zoom()
        );
        Ok(())
    }
}

#[wasm_bindgen::prelude::wasm_bindgen]
impl MapView {
    #[wasm_bindgen::prelude::wasm_bindgen(constructor)]
    pub fn new_wasm(config_json: &str) -> Result<MapView, wasm_bindgen::JsValue> {
        let config = MapConfig::from_json(config_json)?;
        Ok(MapView::from_config(&config)?)
    }

    #[wasm_bindgen::prelude::wasm_bindgen]
    pub fn render_to_canvas_wasm(&self, canvas_id: &str) -> Result<(), wasm_bindgen::JsValue> {
        self.render_to_canvas(canvas_id)
            .map_err(|e| wasm_bindgen::JsValue::from_str(&format!("Rendering error: {}", e)))
    }

    #[wasm_bindgen::prelude::wasm_bindgen]
    pub fn pan_wasm(&mut self, dx: f64, dy: f64) -> Result<(), wasm_bindgen::JsValue> {
        self.engine.pan(dx, dy)?;
        Ok(())
    }

    #[wasm_bindgen::prelude::wasm_bindgen]
    pub fn set_zoom_wasm(&mut self, zoom: u8) -> Result<(), wasm_bindgen::JsValue> {
        self.engine.set_zoom(zoom)?;
        Ok(())
    }

    #[wasm_bindgen::prelude::wasm_bindgen]
    pub fn zoom_around_wasm(&mut self, x: f64, y: f64, zoom: u8) -> Result<(), wasm_bindgen::JsValue> {
        self.engine.zoom_around(PixelPoint::new(x, y), zoom)?;
        Ok(())
    }

    #[wasm_bindgen::prelude::wasm_bindgen]
    pub fn resize_wasm(&mut self, width: u32, height: u32) -> Result<(), wasm_bindgen::JsValue> {
        self.engine.resize(width, height)?;
        Ok(())
    }

    /// Returns the content of the popup left open by the click, if any.
    #[wasm_bindgen::prelude::wasm_bindgen]
    pub fn click_wasm(&mut self, x: f64, y: f64) -> Option<String> {
        self.engine.click(PixelPoint::new(x, y));
        self.engine.popup_content().map(str::to_string)
    }

    #[wasm_bindgen::prelude::wasm_bindgen]
    pub fn frame_json(&self) -> Result<String, wasm_bindgen::JsValue> {
        serde_json::to_string(&self.engine.frame()).map_err(|e| MapError::from(e).into())
    }

    #[wasm_bindgen::prelude::wasm_bindgen]
    pub fn pending_assets_json(&mut self) -> Result<String, wasm_bindgen::JsValue> {
        serde_json::to_string(&self.engine.pending_assets()).map_err(|e| MapError::from(e).into())
    }

    /// Reports a fetch result for a ticket from `pending_assets_json`; `error` marks a failure.
    #[wasm_bindgen::prelude::wasm_bindgen]
    pub fn complete_asset_wasm(
        &mut self,
        ticket_json: &str,
        error: Option<String>,
    ) -> Result<bool, wasm_bindgen::JsValue> {
        let ticket: AssetTicket = serde_json::from_str(ticket_json).map_err(MapError::from)?;
        Ok(self.engine.complete_asset(&ticket, error.map_or(Ok(()), Err)))
    }

    #[wasm_bindgen::prelude::wasm_bindgen(getter)]
    pub fn zoom(&self) -> u8 {
        self.engine.viewport().zoom()
    }

    #[wasm_bindgen::prelude::wasm_bindgen(getter)]
    pub fn center_lat(&self) -> f64 {
        self.engine.viewport().center().lat()
    }

    #[wasm_bindgen::prelude::wasm_bindgen(getter)]
    pub fn center_lng(&self) -> f64 {
        self.engine.viewport().center().lng()
    }
}
