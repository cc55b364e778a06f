use crate::engine::geometry::{distance_to_path, point_in_polygon};
use crate::engine::stack::LayerStack;
use crate::engine::transforms::{project, project_path};
use crate::model::{
    FeatureGeometry, ImageOverlayLayer, LayerKey, LayerKind, MapResult, MarkerLayer, PixelPoint,
    TileLayer, VectorLayer, Viewport,
};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolverOptions {
    /// Also test vector features; markers are always tested.
    pub vector_hits: bool,
    /// Extra pixels around a stroke that still count as a hit.
    pub stroke_tolerance: f64,
    pub point_radius: f64,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        ResolverOptions {
            vector_hits: false,
            stroke_tolerance: 3.0,
            point_radius: 6.0,
        }
    }
}

/// Which part of a layer a pointer landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitPart {
    Icon,
    Feature(usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Hit {
    Marker { key: LayerKey },
    Feature { key: LayerKey, index: usize },
}

impl Hit {
    pub fn key(&self) -> &LayerKey {
        match self {
            Hit::Marker { key } | Hit::Feature { key, .. } => key,
        }
    }
}

/// Screen-space hit test for one layer kind.
pub trait HitTarget {
    fn hit_test(
        &self,
        pixel: &PixelPoint,
        viewport: &Viewport,
        options: &ResolverOptions,
    ) -> MapResult<Option<HitPart>>;
}

impl HitTarget for MarkerLayer {
    fn hit_test(&self, pixel: &PixelPoint, viewport: &Viewport, _: &ResolverOptions) -> MapResult<Option<HitPart>> {
        let anchor = project(self.position, viewport)?;
        let bounds = self.effective_icon().screen_bounds(anchor);
        Ok(bounds.contains(pixel).then_some(HitPart::Icon))
    }
}

impl HitTarget for VectorLayer {
    fn hit_test(
        &self,
        pixel: &PixelPoint,
        viewport: &Viewport,
        options: &ResolverOptions,
    ) -> MapResult<Option<HitPart>> {
        if !options.vector_hits {
            return Ok(None);
        }
        let reach = self.style.weight / 2.0 + options.stroke_tolerance;
        for (index, feature) in self.features.iter().enumerate().rev() {
            let hit = match &feature.geometry {
                FeatureGeometry::Point(point) => {
                    project(*point, viewport)?.distance_to(pixel) <= options.point_radius
                }
                FeatureGeometry::LineString(points) => {
                    distance_to_path(pixel, &project_path(points, viewport)?) <= reach
                }
                FeatureGeometry::Polygon(rings) => {
                    let rings = rings
                        .iter()
                        .map(|ring| project_path(ring, viewport))
                        .collect::<MapResult<Vec<_>>>()?;
                    point_in_polygon(pixel, &rings)
                        || rings.first().is_some_and(|outer| distance_to_path(pixel, outer) <= reach)
                }
            };
            if hit {
                return Ok(Some(HitPart::Feature(index)));
            }
        }
        Ok(None)
    }
}

impl HitTarget for TileLayer {
    fn hit_test(&self, _: &PixelPoint, _: &Viewport, _: &ResolverOptions) -> MapResult<Option<HitPart>> {
        Ok(None)
    }
}

impl HitTarget for ImageOverlayLayer {
    fn hit_test(&self, _: &PixelPoint, _: &Viewport, _: &ResolverOptions) -> MapResult<Option<HitPart>> {
        Ok(None)
    }
}

impl HitTarget for LayerKind {
    fn hit_test(
        &self,
        pixel: &PixelPoint,
        viewport: &Viewport,
        options: &ResolverOptions,
    ) -> MapResult<Option<HitPart>> {
        match self {
            LayerKind::Tile(layer) => layer.hit_test(pixel, viewport, options),
            LayerKind::ImageOverlay(layer) => layer.hit_test(pixel, viewport, options),
            LayerKind::Vector(layer) => layer.hit_test(pixel, viewport, options),
            LayerKind::Marker(layer) => layer.hit_test(pixel, viewport, options),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InteractionResolver {
    pub options: ResolverOptions,
}

impl InteractionResolver {
    pub fn new(options: ResolverOptions) -> Self {
        InteractionResolver { options }
    }

    /// Topmost layer under `pixel`; later layers win over earlier ones.
    pub fn resolve(&self, pixel: &PixelPoint, stack: &LayerStack, viewport: &Viewport) -> Option<Hit> {
        for layer in stack.iter_topmost() {
            match layer.kind.hit_test(pixel, viewport, &self.options) {
                Ok(Some(HitPart::Icon)) => {
                    return Some(Hit::Marker {
                        key: layer.key.clone(),
                    });
                }
                Ok(Some(HitPart::Feature(index))) => {
                    return Some(Hit::Feature {
                        key: layer.key.clone(),
                        index,
                    });
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!("Skipping layer {} during hit test: {}", layer.key, err);
                }
            }
        }
        None
    }

    pub fn hit_test(&self, pixel: &PixelPoint, stack: &LayerStack, viewport: &Viewport) -> Option<LayerKey> {
        self.resolve(pixel, stack, viewport).map(|hit| hit.key().clone())
    }
}

/// Hit test with the default options: markers only.
pub fn hit_test(pixel: &PixelPoint, stack: &LayerStack, viewport: &Viewport) -> Option<LayerKey> {
    InteractionResolver::default().hit_test(pixel, stack, viewport)
}

/// At most one popup is open; it belongs to the marker under `open`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PopupState {
    open: Option<LayerKey>,
}

impl PopupState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_key(&self) -> Option<&LayerKey> {
        self.open.as_ref()
    }

    pub fn is_open(&self, key: &LayerKey) -> bool {
        self.open.as_ref() == Some(key)
    }

    /// Marker hits toggle that marker's popup; anything else dismisses it.
    pub fn apply(&mut self, hit: Option<&Hit>) {
        match hit {
            Some(Hit::Marker { key }) => self.toggle(key),
            _ => {
                self.close();
            }
        }
    }

    pub fn toggle(&mut self, key: &LayerKey) {
        if self.is_open(key) {
            self.open = None;
        } else {
            self.open = Some(key.clone());
        }
    }

    pub fn close(&mut self) -> Option<LayerKey> {
        self.open.take()
    }
}
