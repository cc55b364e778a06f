use super::{Feature, GeoBounds, GeoPoint, MapResult, PixelBounds, PixelPoint};
use crate::error::MapError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_SUBDOMAINS: [&str; 3] = ["a", "b", "c"];

/// Stable identity of a layer across re-compositions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerKey(String);

impl LayerKey {
    pub fn new(key: impl Into<String>) -> Self {
        LayerKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerKey {
    fn from(key: &str) -> Self {
        LayerKey::new(key)
    }
}

impl From<String> for LayerKey {
    fn from(key: String) -> Self {
        LayerKey(key)
    }
}

// Layer management
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub key: LayerKey,
    pub kind: LayerKind,
}

impl Layer {
    pub fn new(key: impl Into<LayerKey>, kind: impl Into<LayerKind>) -> Self {
        Layer {
            key: key.into(),
            kind: kind.into(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            LayerKind::Tile(_) => "tile",
            LayerKind::ImageOverlay(_) => "image-overlay",
            LayerKind::Vector(_) => "vector",
            LayerKind::Marker(_) => "marker",
        }
    }

    pub fn as_marker(&self) -> Option<&MarkerLayer> {
        match &self.kind {
            LayerKind::Marker(marker) => Some(marker),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LayerKind {
    Tile(TileLayer),
    ImageOverlay(ImageOverlayLayer),
    Vector(VectorLayer),
    Marker(MarkerLayer),
}

impl From<TileLayer> for LayerKind {
    fn from(layer: TileLayer) -> Self {
        LayerKind::Tile(layer)
    }
}

impl From<ImageOverlayLayer> for LayerKind {
    fn from(layer: ImageOverlayLayer) -> Self {
        LayerKind::ImageOverlay(layer)
    }
}

impl From<VectorLayer> for LayerKind {
    fn from(layer: VectorLayer) -> Self {
        LayerKind::Vector(layer)
    }
}

impl From<MarkerLayer> for LayerKind {
    fn from(layer: MarkerLayer) -> Self {
        LayerKind::Marker(layer)
    }
}

/// Base map fetched through a `{s}`/`{z}`/`{x}`/`{y}` URL template.
#[derive(Clone, Debug, PartialEq)]
pub struct TileLayer {
    pub url_template: String,
    pub attribution: String,
    pub subdomains: Vec<String>,
}

impl TileLayer {
    pub fn new(url_template: impl Into<String>, attribution: impl Into<String>) -> Self {
        TileLayer {
            url_template: url_template.into(),
            attribution: attribution.into(),
            subdomains: DEFAULT_SUBDOMAINS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_subdomains(mut self, subdomains: Vec<String>) -> Self {
        self.subdomains = subdomains;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageOverlayLayer {
    pub image_url: String,
    pub bounds_sw: GeoPoint,
    pub bounds_ne: GeoPoint,
    pub opacity: f64,
}

impl ImageOverlayLayer {
    pub fn new(image_url: impl Into<String>, bounds_sw: GeoPoint, bounds_ne: GeoPoint) -> Self {
        ImageOverlayLayer {
            image_url: image_url.into(),
            bounds_sw,
            bounds_ne,
            opacity: 1.0,
        }
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn bounds(&self) -> MapResult<GeoBounds> {
        GeoBounds::new(self.bounds_sw, self.bounds_ne)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStyle {
    pub stroke_color: String,
    pub weight: f64,
    pub fill_opacity: f64,
}

impl Default for VectorStyle {
    fn default() -> Self {
        VectorStyle {
            stroke_color: "#3388ff".to_string(),
            weight: 3.0,
            fill_opacity: 0.2,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VectorLayer {
    pub features: Vec<Feature>,
    pub style: VectorStyle,
}

impl VectorLayer {
    pub fn new(features: Vec<Feature>, style: VectorStyle) -> Self {
        VectorLayer { features, style }
    }

    pub fn from_feature_collection(
        collection: &geojson::FeatureCollection,
        style: VectorStyle,
    ) -> MapResult<Self> {
        let features = collection
            .features
            .iter()
            .map(Feature::from_geojson_feature)
            .collect::<MapResult<Vec<_>>>()?;
        tracing::debug!("Read {} features from feature collection", features.len());
        Ok(VectorLayer::new(features, style))
    }

    pub fn from_geojson_str(content: &str, style: VectorStyle) -> MapResult<Self> {
        let geojson: geojson::GeoJson = content
            .parse()
            .map_err(|e| MapError::MalformedGeometry(format!("Invalid GeoJSON: {}", e)))?;

        match geojson {
            geojson::GeoJson::FeatureCollection(fc) => VectorLayer::from_feature_collection(&fc, style),
            geojson::GeoJson::Feature(_) => Err(MapError::MalformedGeometry(
                "expected a FeatureCollection, found a Feature".to_string(),
            )),
            geojson::GeoJson::Geometry(_) => Err(MapError::MalformedGeometry(
                "expected a FeatureCollection, found a bare Geometry".to_string(),
            )),
        }
    }
}

/// Icon image plus the pixel offsets that pin it to the map.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerIcon {
    pub url: String,
    pub size: [f64; 2],
    /// Icon pixel that sits on the marker's projected position.
    pub anchor: [f64; 2],
    /// Popup origin relative to the anchor.
    pub popup_anchor: [f64; 2],
}

impl MarkerIcon {
    pub fn new(url: impl Into<String>, size: [f64; 2], anchor: [f64; 2]) -> Self {
        MarkerIcon {
            url: url.into(),
            size,
            anchor,
            popup_anchor: [0.0, 0.0],
        }
    }

    pub fn with_popup_anchor(mut self, popup_anchor: [f64; 2]) -> Self {
        self.popup_anchor = popup_anchor;
        self
    }

    /// The stock pin used when a marker carries no icon of its own.
    pub fn default_pin() -> Self {
        MarkerIcon::new("marker-icon.png", [25.0, 41.0], [12.0, 41.0]).with_popup_anchor([1.0, -34.0])
    }

    pub fn screen_bounds(&self, position: PixelPoint) -> PixelBounds {
        let origin = position.offset(-self.anchor[0], -self.anchor[1]);
        PixelBounds::from_origin(origin, self.size[0], self.size[1])
    }

    pub fn popup_origin(&self, position: PixelPoint) -> PixelPoint {
        position.offset(self.popup_anchor[0], self.popup_anchor[1])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MarkerLayer {
    pub position: GeoPoint,
    pub icon: Option<MarkerIcon>,
    pub popup_content: String,
}

impl MarkerLayer {
    pub fn new(position: GeoPoint, popup_content: impl Into<String>) -> Self {
        MarkerLayer {
            position,
            icon: None,
            popup_content: popup_content.into(),
        }
    }

    pub fn with_icon(mut self, icon: MarkerIcon) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn effective_icon(&self) -> MarkerIcon {
        self.icon.clone().unwrap_or_else(MarkerIcon::default_pin)
    }
}
