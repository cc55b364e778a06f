use crate::engine::geometry::validate_features;
use crate::error::MapError;
use crate::model::{Layer, LayerKey, LayerKind, MapResult};

#[derive(Clone, Debug)]
struct Slot {
    layer: Layer,
    revision: u64,
}

/// Ordered layers; index 0 paints first, the last layer is on top.
#[derive(Clone, Debug, Default)]
pub struct LayerStack {
    slots: Vec<Slot>,
    revision: u64,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and inserts `layer`, returning its paint index.
    ///
    /// A layer whose key is already present replaces the existing one at the same index.
    pub fn add(&mut self, layer: Layer) -> MapResult<usize> {
        validate_layer(&layer)?;
        self.revision += 1;
        let slot = Slot {
            layer,
            revision: self.revision,
        };

        match self.position(&slot.layer.key) {
            Some(index) => {
                tracing::debug!("Replacing {} layer {} at index {}", slot.layer.kind_name(), slot.layer.key, index);
                self.slots[index] = slot;
                Ok(index)
            }
            None => {
                tracing::debug!("Adding {} layer {}", slot.layer.kind_name(), slot.layer.key);
                self.slots.push(slot);
                Ok(self.slots.len() - 1)
            }
        }
    }

    pub fn remove(&mut self, key: &LayerKey) -> Option<Layer> {
        let index = self.position(key)?;
        self.revision += 1;
        tracing::debug!("Removing layer {}", key);
        Some(self.slots.remove(index).layer)
    }

    /// Moves a layer to `new_index`; indices past the top move it to the top.
    pub fn reorder(&mut self, key: &LayerKey, new_index: usize) -> MapResult<()> {
        let index = self
            .position(key)
            .ok_or_else(|| MapError::UnknownLayer(key.to_string()))?;
        let target = new_index.min(self.slots.len() - 1);
        if target != index {
            let slot = self.slots.remove(index);
            self.slots.insert(target, slot);
            self.revision += 1;
        }
        Ok(())
    }

    /// Layers in paint order.
    pub fn list(&self) -> impl DoubleEndedIterator<Item = &Layer> + ExactSizeIterator {
        self.slots.iter().map(|slot| &slot.layer)
    }

    /// Layers from the top of the stack down.
    pub fn iter_topmost(&self) -> impl Iterator<Item = &Layer> {
        self.list().rev()
    }

    pub fn get(&self, key: &LayerKey) -> Option<&Layer> {
        self.slots
            .iter()
            .find(|slot| &slot.layer.key == key)
            .map(|slot| &slot.layer)
    }

    pub fn position(&self, key: &LayerKey) -> Option<usize> {
        self.slots.iter().position(|slot| &slot.layer.key == key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Revision at which the layer currently under `key` entered the stack.
    pub fn slot_revision(&self, key: &LayerKey) -> Option<u64> {
        self.slots
            .iter()
            .find(|slot| &slot.layer.key == key)
            .map(|slot| slot.revision)
    }
}

fn validate_layer(layer: &Layer) -> MapResult<()> {
    let invalid = |reason: String| MapError::InvalidLayer {
        key: layer.key.to_string(),
        reason,
    };

    if layer.key.as_str().is_empty() {
        return Err(invalid("layer key cannot be empty".to_string()));
    }

    match &layer.kind {
        LayerKind::Tile(tile) => tile.validate_template().map_err(invalid),
        LayerKind::ImageOverlay(overlay) => {
            let bounds = overlay.bounds()?;
            bounds.south_west().ensure_projectable()?;
            bounds.north_east().ensure_projectable()?;
            if !(0.0..=1.0).contains(&overlay.opacity) {
                return Err(invalid(format!(
                    "opacity {} must be between 0.0 and 1.0",
                    overlay.opacity
                )));
            }
            Ok(())
        }
        LayerKind::Vector(vector) => {
            let style = &vector.style;
            if !(style.weight.is_finite() && style.weight >= 0.0) {
                return Err(invalid(format!("stroke weight {} must be >= 0", style.weight)));
            }
            if !(0.0..=1.0).contains(&style.fill_opacity) {
                return Err(invalid(format!(
                    "fill opacity {} must be between 0.0 and 1.0",
                    style.fill_opacity
                )));
            }
            validate_features(&vector.features)
        }
        LayerKind::Marker(marker) => {
            marker.position.ensure_projectable()?;
            if let Some(icon) = &marker.icon {
                if !(icon.size[0] > 0.0 && icon.size[1] > 0.0) {
                    return Err(invalid(format!(
                        "icon size {:?} must be positive",
                        icon.size
                    )));
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Feature, FeatureGeometry, GeoPoint, ImageOverlayLayer, MarkerIcon, MarkerLayer, TileLayer,
        VectorLayer, VectorStyle,
    };
    use pretty_assertions::assert_eq;

    fn geo(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng).unwrap()
    }

    fn marker(key: &str, popup: &str) -> Layer {
        Layer::new(key, MarkerLayer::new(geo(10.8505, 76.2711), popup))
    }

    fn keys(stack: &LayerStack) -> Vec<&str> {
        stack.list().map(|layer| layer.key.as_str()).collect()
    }

    #[test]
    fn insertion_order_is_paint_order() {
        let mut stack = LayerStack::new();
        stack.add(marker("a", "A")).unwrap();
        stack.add(marker("b", "B")).unwrap();
        stack.add(marker("c", "C")).unwrap();
        assert_eq!(keys(&stack), vec!["a", "b", "c"]);
        let topmost: Vec<_> = stack.iter_topmost().map(|l| l.key.as_str()).collect();
        assert_eq!(topmost, vec!["c", "b", "a"]);
    }

    #[test]
    fn duplicate_key_replaces_in_place() {
        let mut stack = LayerStack::new();
        stack.add(marker("a", "A")).unwrap();
        stack.add(marker("b", "B")).unwrap();
        stack.add(marker("c", "C")).unwrap();

        let index = stack.add(marker("a", "A2")).unwrap();

        assert_eq!(index, 0);
        assert_eq!(keys(&stack), vec!["a", "b", "c"]);
        let replaced = stack.get(&"a".into()).and_then(Layer::as_marker).unwrap();
        assert_eq!(replaced.popup_content, "A2");
    }

    #[test]
    fn replacement_bumps_slot_revision() {
        let mut stack = LayerStack::new();
        stack.add(marker("a", "A")).unwrap();
        let first = stack.slot_revision(&"a".into()).unwrap();
        stack.add(marker("a", "A2")).unwrap();
        assert!(stack.slot_revision(&"a".into()).unwrap() > first);
    }

    #[test]
    fn reorder_and_remove() {
        let mut stack = LayerStack::new();
        for key in ["a", "b", "c"] {
            stack.add(marker(key, key)).unwrap();
        }
        stack.reorder(&"a".into(), 2).unwrap();
        assert_eq!(keys(&stack), vec!["b", "c", "a"]);
        stack.reorder(&"a".into(), 0).unwrap();
        assert_eq!(keys(&stack), vec!["a", "b", "c"]);
        stack.reorder(&"b".into(), 99).unwrap();
        assert_eq!(keys(&stack), vec!["a", "c", "b"]);

        assert!(matches!(
            stack.reorder(&"zzz".into(), 0),
            Err(MapError::UnknownLayer(_))
        ));
        assert!(stack.remove(&"c".into()).is_some());
        assert!(stack.remove(&"c".into()).is_none());
        assert_eq!(keys(&stack), vec!["a", "b"]);
    }

    #[test]
    fn inverted_overlay_bounds_are_rejected() {
        let mut stack = LayerStack::new();
        let inverted = ImageOverlayLayer::new("/overlay2.png", geo(35.18, 98.98), geo(5.5546, 65.45));
        assert!(matches!(
            stack.add(Layer::new("overlay", inverted)),
            Err(MapError::InvalidBounds(_))
        ));
        let same_lng = ImageOverlayLayer::new("/overlay2.png", geo(5.0, 70.0), geo(35.0, 70.0));
        assert!(matches!(
            stack.add(Layer::new("overlay", same_lng)),
            Err(MapError::InvalidBounds(_))
        ));
        assert!(stack.is_empty());
    }

    #[test]
    fn overlay_opacity_must_be_a_fraction() {
        let mut stack = LayerStack::new();
        let overlay = ImageOverlayLayer::new("/overlay2.png", geo(5.5546, 65.45), geo(35.18, 98.98))
            .with_opacity(1.5);
        assert!(matches!(
            stack.add(Layer::new("overlay", overlay.clone())),
            Err(MapError::InvalidLayer { .. })
        ));
        assert!(stack.add(Layer::new("overlay", overlay.with_opacity(0.6))).is_ok());
    }

    #[test]
    fn accepted_polygons_have_closed_rings() {
        let mut stack = LayerStack::new();
        let ring = vec![geo(20.0, 77.0), geo(21.0, 78.0), geo(21.5, 76.0), geo(20.0, 77.0)];
        let closed = Feature::new(FeatureGeometry::Polygon(vec![ring.clone()]));
        let open = Feature::new(FeatureGeometry::Polygon(vec![ring[..3].to_vec()]));

        assert!(matches!(
            stack.add(Layer::new("shapes", VectorLayer::new(vec![closed.clone(), open], VectorStyle::default()))),
            Err(MapError::MalformedGeometry(_))
        ));
        stack
            .add(Layer::new("shapes", VectorLayer::new(vec![closed], VectorStyle::default())))
            .unwrap();

        for layer in stack.list() {
            if let LayerKind::Vector(vector) = &layer.kind {
                for feature in &vector.features {
                    if let FeatureGeometry::Polygon(rings) = &feature.geometry {
                        assert!(rings.iter().all(|r| r.first() == r.last()));
                    }
                }
            }
        }
    }

    #[test]
    fn invalid_layers_leave_the_stack_untouched() {
        let mut stack = LayerStack::new();
        stack.add(marker("a", "A")).unwrap();
        let revision = stack.revision();

        let bad_icon = MarkerLayer::new(geo(1.0, 1.0), "x").with_icon(MarkerIcon::new("i.png", [0.0, 32.0], [0.0, 0.0]));
        assert!(stack.add(Layer::new("a", bad_icon)).is_err());
        assert!(stack.add(Layer::new("", TileLayer::new("{z}/{x}/{y}", ""))).is_err());
        let polar = MarkerLayer::new(geo(89.0, 1.0), "pole");
        assert!(matches!(
            stack.add(Layer::new("pole", polar)),
            Err(MapError::InvalidCoordinate(_))
        ));

        assert_eq!(stack.revision(), revision);
        assert_eq!(stack.get(&"a".into()).and_then(Layer::as_marker).unwrap().popup_content, "A");
    }
}
