use super::{GeoPoint, MapResult};
use crate::error::MapError;
use geojson::{JsonObject, Value as GeoValue};

/// Ordered ring of points; a polygon ring repeats its first point at the end.
pub type Ring = Vec<GeoPoint>;

// Geometry types a vector layer can carry
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureGeometry {
    Point(GeoPoint),
    LineString(Vec<GeoPoint>),
    Polygon(Vec<Ring>), // Exterior ring + holes
}

impl FeatureGeometry {
    pub fn from_geojson_geometry(geometry: &geojson::Geometry) -> MapResult<Self> {
        match &geometry.value {
            GeoValue::Point(position) => Ok(FeatureGeometry::Point(GeoPoint::from_position(position)?)),
            GeoValue::LineString(positions) => Ok(FeatureGeometry::LineString(read_positions(positions)?)),
            GeoValue::Polygon(rings) => {
                let rings = rings
                    .iter()
                    .map(|ring| read_positions(ring))
                    .collect::<MapResult<Vec<_>>>()?;
                Ok(FeatureGeometry::Polygon(rings))
            }
            other => Err(MapError::MalformedGeometry(format!(
                "{} geometries are not supported",
                unsupported_type_name(other)
            ))),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FeatureGeometry::Point(_) => "Point",
            FeatureGeometry::LineString(_) => "LineString",
            FeatureGeometry::Polygon(_) => "Polygon",
        }
    }
}

fn unsupported_type_name(value: &GeoValue) -> &'static str {
    match value {
        GeoValue::MultiPoint(_) => "MultiPoint",
        GeoValue::MultiLineString(_) => "MultiLineString",
        GeoValue::MultiPolygon(_) => "MultiPolygon",
        GeoValue::GeometryCollection(_) => "GeometryCollection",
        GeoValue::Point(_) => "Point",
        GeoValue::LineString(_) => "LineString",
        GeoValue::Polygon(_) => "Polygon",
    }
}

fn read_positions(positions: &[geojson::Position]) -> MapResult<Vec<GeoPoint>> {
    positions
        .iter()
        .map(|position| GeoPoint::from_position(position))
        .collect()
}

// Feature structure with geometry and properties
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    pub id: Option<String>,
    pub geometry: FeatureGeometry,
    pub properties: JsonObject,
}

impl Feature {
    pub fn new(geometry: FeatureGeometry) -> Self {
        Feature {
            id: None,
            geometry,
            properties: JsonObject::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn from_geojson_feature(feature: &geojson::Feature) -> MapResult<Self> {
        let id = feature.id.as_ref().map(|id| match id {
            geojson::feature::Id::String(s) => s.clone(),
            geojson::feature::Id::Number(n) => n.to_string(),
        });

        let geometry = match &feature.geometry {
            Some(geometry) => FeatureGeometry::from_geojson_geometry(geometry)?,
            None => {
                return Err(MapError::MalformedGeometry(
                    "feature has no geometry".to_string(),
                ));
            }
        };

        Ok(Feature {
            id,
            geometry,
            properties: feature.properties.clone().unwrap_or_default(),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.properties.get("name").and_then(|value| value.as_str())
    }
}
