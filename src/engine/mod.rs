use crate::config::MapConfig;
use crate::engine::assets::{AssetStatus, AssetTicket, AssetTracker};
use crate::engine::interaction::{Hit, InteractionResolver, PopupState, ResolverOptions};
use crate::engine::renderer::{ComposeInput, Frame, compose};
use crate::engine::stack::LayerStack;
use crate::engine::tiles::visible_tiles;
use crate::engine::viewport::{ListenerId, ViewportController, ZoomRange};
use crate::error::MapError;
use crate::model::{GeoBounds, Layer, LayerKey, LayerKind, MapResult, PixelPoint, Viewport};
use crate::view::legend::Legend;
use serde::Serialize;
use std::collections::HashSet;

pub mod assets;
pub mod geometry;
pub mod interaction;
pub mod renderer;
pub mod stack;
pub mod tiles;
pub mod transforms;
pub mod viewport;

/// Layers a configuration could not turn into stack entries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildReport {
    pub rejected: Vec<(LayerKey, MapError)>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// What a click did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClickOutcome {
    pub hit: Option<Hit>,
    pub popup: Option<LayerKey>,
}

/// Owns the viewport, the layer stack and the popup; every change goes through `&mut self`.
#[derive(Debug)]
pub struct MapEngine {
    controller: ViewportController,
    stack: LayerStack,
    popup: PopupState,
    resolver: InteractionResolver,
    assets: AssetTracker,
    legend: Option<Legend>,
}

impl MapEngine {
    pub fn new(viewport: Viewport, zoom_range: ZoomRange) -> MapResult<Self> {
        Ok(MapEngine {
            controller: ViewportController::new(viewport, zoom_range)?,
            stack: LayerStack::new(),
            popup: PopupState::new(),
            resolver: InteractionResolver::default(),
            assets: AssetTracker::new(),
            legend: None,
        })
    }

    /// Builds an engine from configuration. The viewport must be valid; layers that
    /// fail validation are left out and listed in the report.
    pub fn from_config(config: &MapConfig) -> MapResult<(Self, BuildReport)> {
        let mut engine = MapEngine::new(config.viewport()?, config.zoom_range()?)?
            .with_resolver_options(ResolverOptions {
                vector_hits: config.vector_hits,
                ..ResolverOptions::default()
            });
        engine.legend = config.legend.clone();

        let mut report = BuildReport::default();
        for (key, layer) in config.layers() {
            if let Err(err) = layer.and_then(|layer| engine.add_layer(layer).map(|_| ())) {
                tracing::warn!("Layer {} rejected: {}", key, err);
                report.rejected.push((key, err));
            }
        }
        tracing::info!(
            "Map composed with {} layers ({} rejected)",
            engine.stack.len(),
            report.rejected.len()
        );
        Ok((engine, report))
    }

    pub fn with_resolver_options(mut self, options: ResolverOptions) -> Self {
        self.resolver = InteractionResolver::new(options);
        self
    }

    pub fn with_legend(mut self, legend: Legend) -> Self {
        self.legend = Some(legend);
        self
    }

    pub fn viewport(&self) -> Viewport {
        self.controller.snapshot()
    }

    pub fn zoom_range(&self) -> ZoomRange {
        self.controller.zoom_range()
    }

    pub fn layers(&self) -> &LayerStack {
        &self.stack
    }

    pub fn legend(&self) -> Option<&Legend> {
        self.legend.as_ref()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Viewport, &Viewport) + 'static) -> ListenerId {
        self.controller.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.controller.unsubscribe(id)
    }

    pub fn add_layer(&mut self, layer: Layer) -> MapResult<usize> {
        let key = layer.key.clone();
        let index = self.stack.add(layer)?;
        // a replaced marker no longer owns the popup that was open for it
        if self.popup.is_open(&key) {
            self.popup.close();
        }
        self.assets.forget(&key);
        Ok(index)
    }

    pub fn remove_layer(&mut self, key: &LayerKey) -> Option<Layer> {
        let removed = self.stack.remove(key)?;
        if self.popup.is_open(key) {
            self.popup.close();
        }
        self.assets.forget(key);
        Some(removed)
    }

    pub fn reorder_layer(&mut self, key: &LayerKey, new_index: usize) -> MapResult<()> {
        self.stack.reorder(key, new_index)
    }

    pub fn pan(&mut self, dx: f64, dy: f64) -> MapResult<Viewport> {
        self.controller.pan(dx, dy)
    }

    pub fn set_zoom(&mut self, zoom: u8) -> MapResult<Viewport> {
        self.controller.set_zoom(zoom)
    }

    pub fn zoom_around(&mut self, pixel: PixelPoint, zoom: u8) -> MapResult<Viewport> {
        self.controller.zoom_around(pixel, zoom)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> MapResult<Viewport> {
        self.controller.resize(width, height)
    }

    pub fn fit_bounds(&mut self, bounds: &GeoBounds) -> MapResult<Viewport> {
        self.controller.fit_bounds(bounds)
    }

    /// Resolves a click at `pixel` and updates the popup.
    pub fn click(&mut self, pixel: PixelPoint) -> ClickOutcome {
        let hit = self.resolver.resolve(&pixel, &self.stack, &self.controller.snapshot());
        self.popup.apply(hit.as_ref());
        tracing::debug!("Click at ({}, {}) hit {:?}", pixel.x, pixel.y, hit);
        ClickOutcome {
            hit,
            popup: self.popup.open_key().cloned(),
        }
    }

    pub fn popup(&self) -> &PopupState {
        &self.popup
    }

    /// Content of the open popup, if any.
    pub fn popup_content(&self) -> Option<&str> {
        let key = self.popup.open_key()?;
        self.stack
            .get(key)
            .and_then(Layer::as_marker)
            .map(|marker| marker.popup_content.as_str())
    }

    pub fn frame(&self) -> Frame {
        compose(&ComposeInput {
            stack: &self.stack,
            viewport: &self.controller.snapshot(),
            popup: &self.popup,
            assets: &self.assets,
            legend: self.legend.as_ref(),
        })
    }

    /// Requests every image the current frame needs and returns the tickets still in
    /// flight for it. Tickets for images that left the frame are cancelled.
    pub fn pending_assets(&mut self) -> Vec<AssetTicket> {
        let viewport = self.controller.snapshot();
        let mut wanted = HashSet::new();
        for layer in self.stack.list() {
            match &layer.kind {
                LayerKind::Tile(tile) => match visible_tiles(tile, &viewport) {
                    Ok(tiles) => wanted.extend(tiles.into_iter().map(|t| (layer.key.clone(), t.url))),
                    Err(err) => tracing::warn!("No tiles for layer {}: {}", layer.key, err),
                },
                LayerKind::ImageOverlay(overlay) => {
                    wanted.insert((layer.key.clone(), overlay.image_url.clone()));
                }
                LayerKind::Marker(marker) => {
                    wanted.insert((layer.key.clone(), marker.effective_icon().url));
                }
                LayerKind::Vector(_) => {}
            }
        }

        for (key, url) in &wanted {
            if let Err(err) = self.assets.request(&self.stack, key, url) {
                tracing::warn!("Could not request {} for layer {}: {}", url, key, err);
            }
        }
        self.assets.cancel_unwanted(&wanted);
        self.assets.pending().into_iter().cloned().collect()
    }

    /// Records a fetch result; `false` means it arrived for a layer that has since changed.
    pub fn complete_asset(&mut self, ticket: &AssetTicket, outcome: Result<(), String>) -> bool {
        self.assets.complete(&self.stack, ticket, outcome)
    }

    pub fn asset_status(&self, key: &LayerKey, url: &str) -> Option<&AssetStatus> {
        self.assets.status(&self.stack, key, url)
    }
}
