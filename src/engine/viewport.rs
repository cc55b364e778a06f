use crate::engine::transforms::{from_world, project_bounds, to_world, unproject, world_size, TILE_SIZE};
use crate::error::MapError;
use crate::model::{GeoBounds, MapResult, PixelPoint, Viewport, MAX_SUPPORTED_ZOOM};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZoomRange {
    min: u8,
    max: u8,
}

impl ZoomRange {
    pub fn new(min: u8, max: u8) -> MapResult<Self> {
        if min > max {
            return Err(MapError::InvalidViewport(format!(
                "min zoom {min} cannot be greater than max zoom {max}"
            )));
        }
        if max > MAX_SUPPORTED_ZOOM {
            return Err(MapError::InvalidViewport(format!(
                "max zoom {max} exceeds {MAX_SUPPORTED_ZOOM}"
            )));
        }
        Ok(ZoomRange { min, max })
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    pub fn clamp(&self, zoom: u8) -> u8 {
        zoom.clamp(self.min, self.max)
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        ZoomRange { min: 0, max: 18 }
    }
}

/// Handle returned by [`ViewportController::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&Viewport, &Viewport)>;

/// Owns the current viewport and replaces it with a new snapshot on every change.
pub struct ViewportController {
    viewport: Viewport,
    zoom_range: ZoomRange,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl fmt::Debug for ViewportController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewportController")
            .field("viewport", &self.viewport)
            .field("zoom_range", &self.zoom_range)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ViewportController {
    /// The initial zoom is clamped into `zoom_range`.
    pub fn new(viewport: Viewport, zoom_range: ZoomRange) -> MapResult<Self> {
        let viewport = viewport.with_zoom(zoom_range.clamp(viewport.zoom()))?;
        Ok(ViewportController {
            viewport,
            zoom_range,
            listeners: Vec::new(),
            next_listener: 0,
        })
    }

    pub fn snapshot(&self) -> Viewport {
        self.viewport
    }

    pub fn zoom_range(&self) -> ZoomRange {
        self.zoom_range
    }

    /// Registers a callback invoked with `(previous, current)` after each change.
    pub fn subscribe(&mut self, listener: impl FnMut(&Viewport, &Viewport) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Moves the view by a screen-pixel delta; positive `dx` looks further east.
    ///
    /// Longitude wraps at the antimeridian. A move whose new center would leave the
    /// Mercator band fails and the viewport stays where it was.
    pub fn pan(&mut self, dx: f64, dy: f64) -> MapResult<Viewport> {
        let current = self.viewport;
        let size = world_size(current.zoom());
        let center = to_world(current.center(), current.zoom())?;
        let target = PixelPoint::new((center.x + dx).rem_euclid(size), center.y + dy);
        let new_center = from_world(target, current.zoom())?.ensure_projectable()?;
        self.commit(current.with_center(new_center)?)
    }

    /// Clamps `zoom` into the configured range; the geographic center stays put.
    pub fn set_zoom(&mut self, zoom: u8) -> MapResult<Viewport> {
        let clamped = self.zoom_range.clamp(zoom);
        if clamped != zoom {
            tracing::debug!("Zoom {} clamped to {}", zoom, clamped);
        }
        let next = self.viewport.with_zoom(clamped)?;
        self.commit(next)
    }

    /// Zooms while keeping the geographic point under `pixel` fixed on screen.
    pub fn zoom_around(&mut self, pixel: PixelPoint, zoom: u8) -> MapResult<Viewport> {
        let current = self.viewport;
        let zoom = self.zoom_range.clamp(zoom);
        let anchor = unproject(pixel, &current)?;
        let anchor_world = to_world(anchor, zoom)?;
        let half = current.screen_center();
        let center_world = PixelPoint::new(
            (anchor_world.x - (pixel.x - half.x)).rem_euclid(world_size(zoom)),
            anchor_world.y - (pixel.y - half.y),
        );
        let center = from_world(center_world, zoom)?.ensure_projectable()?;
        self.commit(Viewport::new(center, zoom, current.width(), current.height())?)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> MapResult<Viewport> {
        let next = self.viewport.with_size(width, height)?;
        self.commit(next)
    }

    /// Centers on `bounds` at the largest zoom that still shows all of it.
    pub fn fit_bounds(&mut self, bounds: &GeoBounds) -> MapResult<Viewport> {
        let current = self.viewport;
        let sw = to_world(bounds.south_west(), 0)?;
        let ne = to_world(bounds.north_east(), 0)?;
        let mid = PixelPoint::new((sw.x + ne.x) / 2.0, (sw.y + ne.y) / 2.0);

        let mut zoom = self.zoom_range.min();
        for candidate in (self.zoom_range.min()..=self.zoom_range.max()).rev() {
            let probe = Viewport::new(from_world(mid, 0)?, candidate, current.width(), current.height())?;
            let rect = project_bounds(bounds, &probe)?;
            if rect.width() <= current.width() as f64 && rect.height() <= current.height() as f64 {
                zoom = candidate;
                break;
            }
        }

        let scale = world_size(zoom) / TILE_SIZE;
        let center = from_world(PixelPoint::new(mid.x * scale, mid.y * scale), zoom)?;
        self.commit(Viewport::new(center, zoom, current.width(), current.height())?)
    }

    fn commit(&mut self, next: Viewport) -> MapResult<Viewport> {
        let previous = std::mem::replace(&mut self.viewport, next);
        if previous != next {
            tracing::debug!(
                "Viewport moved to {} zoom {} ({}x{})",
                next.center(),
                next.zoom(),
                next.width(),
                next.height()
            );
            for (_, listener) in self.listeners.iter_mut() {
                listener(&previous, &next);
            }
        }
        Ok(next)
    }
}
