use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MapError {
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),
    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),
    #[error("invalid bounds: {0}")]
    InvalidBounds(String),
    #[error("asset load failure for {url}: {reason}")]
    AssetLoadFailure { url: String, reason: String },
    #[error("invalid layer {key}: {reason}")]
    InvalidLayer { key: String, reason: String },
    #[error("unknown layer: {0}")]
    UnknownLayer(String),
    #[error("invalid viewport: {0}")]
    InvalidViewport(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("WebAssembly error: {0}")]
    Wasm(String),
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        MapError::Config(err.to_string())
    }
}

impl From<MapError> for wasm_bindgen::JsValue {
    fn from(err: MapError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}
