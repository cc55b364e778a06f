use crate::engine::viewport::ZoomRange;
use crate::model::{
    GeoPoint, ImageOverlayLayer, Layer, LayerKey, MapResult, MarkerIcon, MarkerLayer, TileLayer,
    VectorLayer, VectorStyle, Viewport,
};
use crate::view::legend::Legend;
use serde::{Deserialize, Serialize};

/// Map description supplied by the host, usually as JSON.
///
/// Coordinates are `[latitude, longitude]` pairs, as a map host writes them;
/// only the GeoJSON inside `vector_layers` is longitude-first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    pub center: [f64; 2],
    pub zoom: u8,
    #[serde(default)]
    pub min_zoom: Option<u8>,
    #[serde(default)]
    pub max_zoom: Option<u8>,
    /// Screen size in pixels, `[width, height]`.
    #[serde(default = "default_screen")]
    pub screen: [u32; 2],
    pub tile: TileConfig,
    #[serde(default)]
    pub overlays: Vec<OverlayConfig>,
    #[serde(default)]
    pub vector_layers: Vec<VectorConfig>,
    #[serde(default)]
    pub markers: Vec<MarkerConfig>,
    #[serde(default)]
    pub legend: Option<Legend>,
    #[serde(default)]
    pub vector_hits: bool,
}

fn default_screen() -> [u32; 2] {
    [800, 600]
}

fn default_tile_key() -> String {
    "base".to_string()
}

fn default_opacity() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileConfig {
    #[serde(default = "default_tile_key")]
    pub key: String,
    pub url_template: String,
    #[serde(default)]
    pub attribution: String,
    #[serde(default)]
    pub subdomains: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default)]
    pub key: Option<String>,
    pub url: String,
    /// `[[south, west], [north, east]]`
    pub bounds: [[f64; 2]; 2],
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorConfig {
    #[serde(default)]
    pub key: Option<String>,
    pub data: geojson::FeatureCollection,
    #[serde(default)]
    pub style: VectorStyle,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IconConfig {
    pub url: String,
    pub size: [f64; 2],
    pub anchor: [f64; 2],
    #[serde(default)]
    pub popup_anchor: [f64; 2],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerConfig {
    #[serde(default)]
    pub key: Option<String>,
    pub position: [f64; 2],
    #[serde(default)]
    pub popup: String,
    #[serde(default)]
    pub icon: Option<IconConfig>,
}

fn geo([lat, lng]: [f64; 2]) -> MapResult<GeoPoint> {
    GeoPoint::new(lat, lng)
}

fn key_or(key: &Option<String>, prefix: &str, index: usize) -> LayerKey {
    key.clone()
        .map(LayerKey::from)
        .unwrap_or_else(|| LayerKey::from(format!("{prefix}-{index}")))
}

impl MapConfig {
    pub fn from_json(content: &str) -> MapResult<Self> {
        let config: MapConfig = serde_json::from_str(content)?;
        tracing::debug!(
            "Parsed map config with {} overlays, {} vector layers, {} markers",
            config.overlays.len(),
            config.vector_layers.len(),
            config.markers.len()
        );
        Ok(config)
    }

    pub fn viewport(&self) -> MapResult<Viewport> {
        let [width, height] = self.screen;
        Viewport::new(geo(self.center)?, self.zoom, width, height)
    }

    pub fn zoom_range(&self) -> MapResult<ZoomRange> {
        let defaults = ZoomRange::default();
        ZoomRange::new(
            self.min_zoom.unwrap_or(defaults.min()),
            self.max_zoom.unwrap_or(defaults.max()),
        )
    }

    /// Layers in paint order: base tiles, overlays, vector data, then markers.
    /// Each entry carries its own conversion result so one bad layer does not
    /// hide the others.
    pub fn layers(&self) -> Vec<(LayerKey, MapResult<Layer>)> {
        let mut layers = Vec::new();

        let tile_key = LayerKey::from(self.tile.key.as_str());
        let mut tile = TileLayer::new(&self.tile.url_template, &self.tile.attribution);
        if let Some(subdomains) = &self.tile.subdomains {
            tile = tile.with_subdomains(subdomains.clone());
        }
        layers.push((tile_key.clone(), Ok(Layer::new(tile_key, tile))));

        for (index, overlay) in self.overlays.iter().enumerate() {
            let key = key_or(&overlay.key, "overlay", index);
            let layer = geo(overlay.bounds[0]).and_then(|sw| {
                let ne = geo(overlay.bounds[1])?;
                Ok(Layer::new(
                    key.clone(),
                    ImageOverlayLayer::new(&overlay.url, sw, ne).with_opacity(overlay.opacity),
                ))
            });
            layers.push((key, layer));
        }

        for (index, vector) in self.vector_layers.iter().enumerate() {
            let key = key_or(&vector.key, "vector", index);
            let layer = VectorLayer::from_feature_collection(&vector.data, vector.style.clone())
                .map(|layer| Layer::new(key.clone(), layer));
            layers.push((key, layer));
        }

        for (index, marker) in self.markers.iter().enumerate() {
            let key = key_or(&marker.key, "marker", index);
            let layer = geo(marker.position).map(|position| {
                let mut layer = MarkerLayer::new(position, &marker.popup);
                if let Some(icon) = &marker.icon {
                    layer = layer.with_icon(
                        MarkerIcon::new(&icon.url, icon.size, icon.anchor).with_popup_anchor(icon.popup_anchor),
                    );
                }
                Layer::new(key.clone(), layer)
            });
            layers.push((key, layer));
        }

        layers
    }
}
