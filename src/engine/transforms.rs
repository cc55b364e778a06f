#![allow(non_upper_case_globals)]

use crate::error::MapError;
use crate::model::{GeoBounds, GeoPoint, MapResult, PixelBounds, PixelPoint, Viewport};
use std::f64::consts::PI;

// Pure spherical Mercator transforms between geographic and screen space

pub const TILE_SIZE: f64 = 256.0;

// Width (and height) of the whole world in pixels at a zoom level
pub const world_size: fn(u8) -> f64 = |zoom| TILE_SIZE * 2.0_f64.powi(zoom as i32);

pub const wrap_longitude: fn(f64) -> f64 = |lng| {
    if (-180.0..=180.0).contains(&lng) {
        lng
    } else {
        (lng + 180.0).rem_euclid(360.0) - 180.0
    }
};

// Geographic point to absolute world pixel, origin at the north-west corner of the world
pub const to_world: fn(GeoPoint, u8) -> MapResult<PixelPoint> = |geo, zoom| {
    let geo = geo.ensure_projectable()?;
    let size = world_size(zoom);
    let x = (geo.lng() + 180.0) / 360.0 * size;
    let lat_rad = geo.lat().to_radians();
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * size;
    Ok(PixelPoint::new(x, y))
};

// Absolute world pixel back to a geographic point; x wraps, y must stay on the world
pub const from_world: fn(PixelPoint, u8) -> MapResult<GeoPoint> = |point, zoom| {
    if !point.x.is_finite() || !point.y.is_finite() {
        return Err(MapError::InvalidCoordinate(format!(
            "pixel ({}, {}) is not finite",
            point.x, point.y
        )));
    }
    let size = world_size(zoom);
    if point.y < 0.0 || point.y > size {
        return Err(MapError::InvalidCoordinate(format!(
            "world pixel row {} lies beyond the Mercator band at zoom {zoom}",
            point.y
        )));
    }
    let lng = wrap_longitude(point.x / size * 360.0 - 180.0);
    let lat = (PI * (1.0 - 2.0 * point.y / size)).sinh().atan().to_degrees();
    GeoPoint::new(lat, lng)
};

// World pixel under the viewport's top-left screen corner
pub const screen_origin: fn(&Viewport) -> MapResult<PixelPoint> = |viewport| {
    let center = to_world(viewport.center(), viewport.zoom())?;
    let half = viewport.screen_center();
    Ok(PixelPoint::new(center.x - half.x, center.y - half.y))
};

pub const project: fn(GeoPoint, &Viewport) -> MapResult<PixelPoint> = |geo, viewport| {
    let world = to_world(geo, viewport.zoom())?;
    let origin = screen_origin(viewport)?;
    Ok(PixelPoint::new(world.x - origin.x, world.y - origin.y))
};

pub const unproject: fn(PixelPoint, &Viewport) -> MapResult<GeoPoint> = |pixel, viewport| {
    let origin = screen_origin(viewport)?;
    from_world(
        PixelPoint::new(pixel.x + origin.x, pixel.y + origin.y),
        viewport.zoom(),
    )
};

// Screen rectangle of a geographic rectangle; Mercator keeps it axis-aligned
pub const project_bounds: fn(&GeoBounds, &Viewport) -> MapResult<PixelBounds> = |bounds, viewport| {
    let sw = project(bounds.south_west(), viewport)?;
    let ne = project(bounds.north_east(), viewport)?;
    Ok(PixelBounds::new(sw.x, ne.y, ne.x, sw.y))
};

pub const project_path: fn(&[GeoPoint], &Viewport) -> MapResult<Vec<PixelPoint>> =
    |points, viewport| points.iter().map(|point| project(*point, viewport)).collect();

// Bounding box calculations from screen coordinates
pub const calculate_bounds_from_coordinates: fn(&[PixelPoint]) -> Option<PixelBounds> =
    |coordinates| {
        if coordinates.is_empty() {
            return None;
        }

        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for point in coordinates {
            if point.x < min_x { min_x = point.x; }
            if point.y < min_y { min_y = point.y; }
            if point.x > max_x { max_x = point.x; }
            if point.y > max_y { max_y = point.y; }
        }

        Some(PixelBounds::new(min_x, min_y, max_x, max_y))
    };

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(lat: f64, lng: f64, zoom: u8) -> Viewport {
        Viewport::new(GeoPoint::new(lat, lng).unwrap(), zoom, 800, 600).unwrap()
    }

    #[test]
    fn world_origin_is_north_west() {
        let world = to_world(GeoPoint::new(0.0, 0.0).unwrap(), 0).unwrap();
        assert!((world.x - 128.0).abs() < 1e-12);
        assert!((world.y - 128.0).abs() < 1e-12);
        assert_eq!(world_size(5), 8192.0);
    }

    #[test]
    fn center_projects_to_screen_center() {
        let view = viewport(20.5937, 78.9629, 5);
        let pixel = project(view.center(), &view).unwrap();
        assert!((pixel.x - 400.0).abs() < 1e-9);
        assert!((pixel.y - 300.0).abs() < 1e-9);
    }

    #[test]
    fn round_trip_stays_within_tolerance() {
        let samples = [
            (0.0, 0.0),
            (84.99, 179.99),
            (-84.99, -179.99),
            (20.91, 77.75),
            (51.5074, -0.1278),
            (-33.8688, 151.2093),
        ];
        for zoom in [0u8, 5, 12, 18] {
            let view = viewport(10.0, 20.0, zoom);
            for (lat, lng) in samples {
                let geo = GeoPoint::new(lat, lng).unwrap();
                let back = unproject(project(geo, &view).unwrap(), &view).unwrap();
                assert!((back.lat() - lat).abs() <= 1e-9, "lat {lat} at zoom {zoom}");
                assert!((back.lng() - lng).abs() <= 1e-9, "lng {lng} at zoom {zoom}");
            }
        }
    }

    #[test]
    fn polar_latitudes_fail_explicitly() {
        let view = viewport(0.0, 0.0, 3);
        let polar = GeoPoint::new(85.1, 0.0).unwrap();
        assert!(matches!(project(polar, &view), Err(MapError::InvalidCoordinate(_))));
        let south = GeoPoint::new(-90.0, 0.0).unwrap();
        assert!(project(south, &view).is_err());
    }

    #[test]
    fn pixels_above_the_world_fail() {
        let view = viewport(0.0, 0.0, 0);
        // world is 256px tall and centered on a 600px-high screen
        assert!(matches!(
            unproject(PixelPoint::new(400.0, 100.0), &view),
            Err(MapError::InvalidCoordinate(_))
        ));
        assert!(unproject(PixelPoint::new(400.0, 300.0), &view).is_ok());
    }

    #[test]
    fn longitude_wraps_past_antimeridian() {
        assert_eq!(wrap_longitude(190.0), -170.0);
        assert_eq!(wrap_longitude(-190.0), 170.0);
        assert_eq!(wrap_longitude(180.0), 180.0);

        let view = viewport(0.0, 179.0, 4);
        let east = unproject(PixelPoint::new(800.0, 300.0), &view).unwrap();
        assert!(east.lng() < 0.0);
    }

    #[test]
    fn bounds_project_to_screen_rectangle() {
        let view = viewport(20.5937, 78.9629, 5);
        let bounds = GeoBounds::new(
            GeoPoint::new(5.5546, 65.45).unwrap(),
            GeoPoint::new(35.18, 98.98).unwrap(),
        )
        .unwrap();
        let rect = project_bounds(&bounds, &view).unwrap();
        assert!(rect.width() > 0.0);
        assert!(rect.height() > 0.0);
        assert!(rect.contains(&view.screen_center()));
    }

    #[test]
    fn bounds_of_empty_path_is_none() {
        assert!(calculate_bounds_from_coordinates(&[]).is_none());
        let bounds = calculate_bounds_from_coordinates(&[
            PixelPoint::new(3.0, 4.0),
            PixelPoint::new(-1.0, 9.0),
        ])
        .unwrap();
        assert_eq!(bounds, PixelBounds::new(-1.0, 4.0, 3.0, 9.0));
    }
}
