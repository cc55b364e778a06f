#![allow(non_upper_case_globals)]

use crate::error::MapError;
use crate::model::{Feature, FeatureGeometry, GeoPoint, MapResult, PixelPoint};

// Feature validation applied when a vector layer joins the stack.
// Unclosed polygon rings are rejected rather than repaired.

pub const MIN_RING_POINTS: usize = 4;

pub const ensure_projectable_points: fn(&[GeoPoint]) -> MapResult<()> =
    |points| points.iter().try_for_each(|point| point.ensure_projectable().map(|_| ()));

pub const validate_ring: fn(usize, &[GeoPoint]) -> MapResult<()> = |index, ring| {
    if ring.is_empty() {
        return Err(MapError::MalformedGeometry(format!(
            "ring {index} has an empty coordinate list"
        )));
    }
    if ring.first() != ring.last() {
        return Err(MapError::MalformedGeometry(format!(
            "ring {index} is not closed: first and last positions differ"
        )));
    }
    if ring.len() < MIN_RING_POINTS {
        return Err(MapError::MalformedGeometry(format!(
            "ring {index} has {} positions, a closed ring needs at least {MIN_RING_POINTS}",
            ring.len()
        )));
    }
    ensure_projectable_points(ring)
};

pub const validate_geometry: fn(&FeatureGeometry) -> MapResult<()> = |geometry| match geometry {
    FeatureGeometry::Point(point) => point.ensure_projectable().map(|_| ()),
    FeatureGeometry::LineString(points) => {
        if points.is_empty() {
            return Err(MapError::MalformedGeometry(
                "line string has an empty coordinate list".to_string(),
            ));
        }
        if points.len() < 2 {
            return Err(MapError::MalformedGeometry(
                "line string needs at least two positions".to_string(),
            ));
        }
        ensure_projectable_points(points)
    }
    FeatureGeometry::Polygon(rings) => {
        if rings.is_empty() {
            return Err(MapError::MalformedGeometry(
                "polygon has no rings".to_string(),
            ));
        }
        rings
            .iter()
            .enumerate()
            .try_for_each(|(index, ring)| validate_ring(index, ring))
    }
};

pub fn validate_features(features: &[Feature]) -> MapResult<()> {
    for (index, feature) in features.iter().enumerate() {
        validate_geometry(&feature.geometry).map_err(|err| {
            let label = feature
                .id
                .clone()
                .or_else(|| feature.name().map(str::to_string))
                .unwrap_or_else(|| format!("#{index}"));
            tracing::warn!("Rejecting feature {} ({}): {}", label, feature.geometry.type_name(), err);
            match err {
                MapError::MalformedGeometry(msg) => {
                    MapError::MalformedGeometry(format!("feature {label}: {msg}"))
                }
                MapError::InvalidCoordinate(msg) => {
                    MapError::InvalidCoordinate(format!("feature {label}: {msg}"))
                }
                other => other,
            }
        })?;
    }
    Ok(())
}

// Screen-space tests used by vector hit-testing

// Even-odd ray cast against one ring
pub const point_in_ring: fn(&PixelPoint, &[PixelPoint]) -> bool = |point, ring| {
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > point.y) != (b.y > point.y)
            && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
};

// Inside the exterior ring and outside every hole
pub const point_in_polygon: fn(&PixelPoint, &[Vec<PixelPoint>]) -> bool = |point, rings| {
    match rings.split_first() {
        Some((outer, holes)) => {
            point_in_ring(point, outer) && !holes.iter().any(|hole| point_in_ring(point, hole))
        }
        None => false,
    }
};

pub const distance_to_segment: fn(&PixelPoint, &PixelPoint, &PixelPoint) -> f64 = |point, a, b| {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return point.distance_to(a);
    }
    let t = (((point.x - a.x) * dx + (point.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    point.distance_to(&PixelPoint::new(a.x + t * dx, a.y + t * dy))
};

pub const distance_to_path: fn(&PixelPoint, &[PixelPoint]) -> f64 = |point, path| match path {
    [] => f64::INFINITY,
    [only] => point.distance_to(only),
    _ => path
        .windows(2)
        .map(|pair| distance_to_segment(point, &pair[0], &pair[1]))
        .fold(f64::INFINITY, f64::min),
};
