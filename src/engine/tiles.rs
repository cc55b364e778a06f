use crate::engine::transforms::{TILE_SIZE, screen_origin};
use crate::model::{MapResult, PixelBounds, PixelPoint, TileLayer, Viewport};
use serde::Serialize;

const REQUIRED_PLACEHOLDERS: [&str; 3] = ["{z}", "{x}", "{y}"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    pub fn is_valid_for_zoom(&self, z: u8) -> bool {
        let max_coord = 1u64 << z;
        (self.x as u64) < max_coord && (self.y as u64) < max_coord && self.z == z
    }
}

/// One tile image and where it lands on screen.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TilePlacement {
    pub coord: TileCoord,
    pub url: String,
    pub bounds: PixelBounds,
}

impl TileLayer {
    pub fn validate_template(&self) -> Result<(), String> {
        if let Some(missing) = REQUIRED_PLACEHOLDERS
            .iter()
            .find(|placeholder| !self.url_template.contains(**placeholder))
        {
            return Err(format!("url template lacks the {missing} placeholder"));
        }
        if self.url_template.contains("{s}") && self.subdomains.is_empty() {
            return Err("url template uses {s} but no subdomains are configured".to_string());
        }
        Ok(())
    }

    pub fn subdomain_for(&self, coord: &TileCoord) -> Option<&str> {
        if self.subdomains.is_empty() {
            return None;
        }
        let index = (coord.x as u64 + coord.y as u64) % self.subdomains.len() as u64;
        self.subdomains.get(index as usize).map(String::as_str)
    }

    pub fn url_for(&self, coord: &TileCoord) -> String {
        self.url_template
            .replace("{s}", self.subdomain_for(coord).unwrap_or_default())
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }
}

/// Tiles covering the screen, rows clamped to the world and columns wrapped around it.
pub fn visible_tiles(layer: &TileLayer, viewport: &Viewport) -> MapResult<Vec<TilePlacement>> {
    let origin = screen_origin(viewport)?;
    let z = viewport.zoom();
    let tiles_per_axis = 1i64 << z;

    let min_tx = (origin.x / TILE_SIZE).floor() as i64;
    let max_tx = ((origin.x + viewport.width() as f64) / TILE_SIZE).ceil() as i64 - 1;
    let min_ty = ((origin.y / TILE_SIZE).floor() as i64).max(0);
    let max_ty = (((origin.y + viewport.height() as f64) / TILE_SIZE).ceil() as i64 - 1)
        .min(tiles_per_axis - 1);

    let mut tiles = Vec::new();
    for ty in min_ty..=max_ty {
        for tx in min_tx..=max_tx {
            let coord = TileCoord::new(tx.rem_euclid(tiles_per_axis) as u32, ty as u32, z);
            let corner = PixelPoint::new(
                tx as f64 * TILE_SIZE - origin.x,
                ty as f64 * TILE_SIZE - origin.y,
            );
            tiles.push(TilePlacement {
                coord,
                url: layer.url_for(&coord),
                bounds: PixelBounds::from_origin(corner, TILE_SIZE, TILE_SIZE),
            });
        }
    }
    tracing::trace!("{} tiles visible at zoom {}", tiles.len(), z);
    Ok(tiles)
}
