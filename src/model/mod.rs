use crate::error::MapError;
use serde::Serialize;
use std::fmt;

mod feature;
mod layer;

pub use feature::{Feature, FeatureGeometry, Ring};
pub use layer::{
    DEFAULT_SUBDOMAINS, ImageOverlayLayer, Layer, LayerKey, LayerKind, MarkerIcon, MarkerLayer,
    TileLayer, VectorLayer, VectorStyle,
};

pub type MapResult<T> = Result<T, MapError>;

/// Latitude where spherical Mercator maps to the edge of a square world.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Highest zoom a viewport may carry; world pixel coordinates stay exact in f64 well past it.
pub const MAX_SUPPORTED_ZOOM: u8 = 30;

// Geographic point (latitude, longitude)
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> MapResult<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(MapError::InvalidCoordinate(format!(
                "latitude {lat} outside [-90, 90]"
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(MapError::InvalidCoordinate(format!(
                "longitude {lng} outside [-180, 180]"
            )));
        }
        Ok(GeoPoint { lat, lng })
    }

    /// Reads an interchange position, which is longitude-first.
    pub fn from_position(position: &[f64]) -> MapResult<Self> {
        match position {
            [lng, lat, ..] => GeoPoint::new(*lat, *lng),
            _ => Err(MapError::MalformedGeometry(format!(
                "position needs [longitude, latitude], got {} values",
                position.len()
            ))),
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    pub fn is_projectable(&self) -> bool {
        self.lat.abs() < MAX_LATITUDE
    }

    pub fn ensure_projectable(self) -> MapResult<Self> {
        if self.is_projectable() {
            Ok(self)
        } else {
            Err(MapError::InvalidCoordinate(format!(
                "latitude {} is inside the Mercator polar band (|lat| >= {MAX_LATITUDE})",
                self.lat
            )))
        }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lng)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        PixelPoint { x, y }
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        PixelPoint::new(self.x + dx, self.y + dy)
    }

    pub fn distance_to(&self, other: &PixelPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PixelBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl PixelBounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        PixelBounds {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_origin(origin: PixelPoint, width: f64, height: f64) -> Self {
        PixelBounds::new(origin.x, origin.y, origin.x + width, origin.y + height)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Edges are inclusive so an icon anchored on its bottom row still hits at the anchor.
    pub fn contains(&self, point: &PixelPoint) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.y >= self.min_y && point.y <= self.max_y
    }

    pub fn intersects(&self, other: &PixelBounds) -> bool {
        !(self.max_x < other.min_x
            || self.min_x > other.max_x
            || self.max_y < other.min_y
            || self.min_y > other.max_y)
    }

    /// Corners clockwise from the top-left.
    pub fn corners(&self) -> [PixelPoint; 4] {
        [
            PixelPoint::new(self.min_x, self.min_y),
            PixelPoint::new(self.max_x, self.min_y),
            PixelPoint::new(self.max_x, self.max_y),
            PixelPoint::new(self.min_x, self.max_y),
        ]
    }
}

/// Geographic rectangle given by its south-west and north-east corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoBounds {
    south_west: GeoPoint,
    north_east: GeoPoint,
}

impl GeoBounds {
    pub fn new(south_west: GeoPoint, north_east: GeoPoint) -> MapResult<Self> {
        if south_west.lat >= north_east.lat {
            return Err(MapError::InvalidBounds(format!(
                "south-west latitude {} must be below north-east latitude {}",
                south_west.lat, north_east.lat
            )));
        }
        if south_west.lng >= north_east.lng {
            return Err(MapError::InvalidBounds(format!(
                "south-west longitude {} must be west of north-east longitude {}",
                south_west.lng, north_east.lng
            )));
        }
        Ok(GeoBounds {
            south_west,
            north_east,
        })
    }

    pub fn south_west(&self) -> GeoPoint {
        self.south_west
    }

    pub fn north_east(&self) -> GeoPoint {
        self.north_east
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }
}

// Viewport snapshot; the controller hands out a fresh copy on every change
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Viewport {
    center: GeoPoint,
    zoom: u8,
    width: u32,
    height: u32,
}

impl Viewport {
    pub fn new(center: GeoPoint, zoom: u8, width: u32, height: u32) -> MapResult<Self> {
        let center = center.ensure_projectable()?;
        if zoom > MAX_SUPPORTED_ZOOM {
            return Err(MapError::InvalidViewport(format!(
                "zoom {zoom} exceeds {MAX_SUPPORTED_ZOOM}"
            )));
        }
        if width == 0 || height == 0 {
            return Err(MapError::InvalidViewport(
                "size dimensions must be greater than 0".to_string(),
            ));
        }
        Ok(Viewport {
            center,
            zoom,
            width,
            height,
        })
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn screen_center(&self) -> PixelPoint {
        PixelPoint::new(self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    pub fn screen_bounds(&self) -> PixelBounds {
        PixelBounds::new(0.0, 0.0, self.width as f64, self.height as f64)
    }

    pub fn with_center(self, center: GeoPoint) -> MapResult<Self> {
        Viewport::new(center, self.zoom, self.width, self.height)
    }

    pub fn with_zoom(self, zoom: u8) -> MapResult<Self> {
        Viewport::new(self.center, zoom, self.width, self.height)
    }

    pub fn with_size(self, width: u32, height: u32) -> MapResult<Self> {
        Viewport::new(self.center, self.zoom, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_point_rejects_out_of_range_values() {
        assert!(matches!(
            GeoPoint::new(91.0, 0.0),
            Err(MapError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            GeoPoint::new(0.0, -180.5),
            Err(MapError::InvalidCoordinate(_))
        ));
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn position_is_longitude_first() {
        let point = GeoPoint::from_position(&[77.0, 20.0]).unwrap();
        assert_eq!(point.lat(), 20.0);
        assert_eq!(point.lng(), 77.0);
        assert!(matches!(
            GeoPoint::from_position(&[77.0]),
            Err(MapError::MalformedGeometry(_))
        ));
    }

    #[test]
    fn polar_band_is_not_projectable() {
        let point = GeoPoint::new(85.06, 10.0).unwrap();
        assert!(!point.is_projectable());
        assert!(matches!(
            point.ensure_projectable(),
            Err(MapError::InvalidCoordinate(_))
        ));
        assert!(GeoPoint::new(-85.0, 10.0).unwrap().is_projectable());
    }

    #[test]
    fn geo_bounds_require_ordered_corners() {
        let sw = GeoPoint::new(5.5546, 65.45).unwrap();
        let ne = GeoPoint::new(35.18, 98.98).unwrap();
        let bounds = GeoBounds::new(sw, ne).unwrap();
        assert!(bounds.contains(&GeoPoint::new(20.0, 78.0).unwrap()));
        assert!(matches!(
            GeoBounds::new(ne, sw),
            Err(MapError::InvalidBounds(_))
        ));
        assert!(matches!(
            GeoBounds::new(sw, sw),
            Err(MapError::InvalidBounds(_))
        ));
    }

    #[test]
    fn viewport_validates_size_and_center() {
        let center = GeoPoint::new(20.5937, 78.9629).unwrap();
        assert!(Viewport::new(center, 5, 800, 600).is_ok());
        assert!(matches!(
            Viewport::new(center, 5, 0, 600),
            Err(MapError::InvalidViewport(_))
        ));
        let polar = GeoPoint::new(89.0, 0.0).unwrap();
        assert!(matches!(
            Viewport::new(polar, 5, 800, 600),
            Err(MapError::InvalidCoordinate(_))
        ));
    }

    #[test]
    fn pixel_bounds_contain_their_edges() {
        let bounds = PixelBounds::from_origin(PixelPoint::new(10.0, 20.0), 25.0, 41.0);
        assert!(bounds.contains(&PixelPoint::new(35.0, 61.0)));
        assert!(bounds.contains(&PixelPoint::new(10.0, 20.0)));
        assert!(!bounds.contains(&PixelPoint::new(35.1, 61.0)));
        assert_eq!(bounds.corners()[2], PixelPoint::new(35.0, 61.0));
    }
}
