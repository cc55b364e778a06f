pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod view;

pub use config::MapConfig;
pub use engine::{BuildReport, ClickOutcome, MapEngine};
pub use error::MapError;
pub use model::{GeoBounds, GeoPoint, Layer, LayerKey, LayerKind, MapResult, PixelPoint, Viewport};
pub use view::view::MapView;
