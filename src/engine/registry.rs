use crate::engine::camera::Camera;
use crate::engine::events::{SubscriptionKey, SubscriptionKind, Subscriptions};
use crate::error::{MapViewError, MapViewResult};
use crate::model::{Layer, LayerId, LayerSlot, LayerSource, LayerSpec, LayerStyle};
use crate::view::surface::MapSurface;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitOptions {
    pub padding: f64,
    pub duration: Duration,
    pub max_zoom: f64,
}

/// Owns the mounted layers, one per [`LayerSlot`].
///
/// Replacing a slot unmounts the old layer (and releases the event
/// subscriptions scoped to it) before the new one is mounted, inside a single
/// call, so no observer ever sees two layers in one slot.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    slots: BTreeMap<LayerSlot, Layer>,
    slot_subscriptions: HashMap<LayerSlot, SubscriptionKey>,
    next_id: u64,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> LayerId {
        self.next_id += 1;
        LayerId(self.next_id)
    }

    /// Mounts the base raster layer unless one is already mounted.
    pub fn set_base_layer(&mut self, surface: &mut dyn MapSurface, url_template: &str) -> LayerId {
        if let Some(base) = self.slots.get(&LayerSlot::Base) {
            return base.id;
        }
        let layer = Layer {
            id: self.next_id(),
            slot: LayerSlot::Base,
            source: LayerSource::Raster {
                url_template: url_template.to_string(),
            },
            style: LayerStyle::Unstyled,
        };
        surface.mount_layer(&layer);
        tracing::info!("mounted base layer {} from {}", layer.id, url_template);
        let id = layer.id;
        self.slots.insert(LayerSlot::Base, layer);
        id
    }

    /// Mounts `spec` into its slot, returning the layer it replaced.
    ///
    /// A tiled overlay additionally holds a click subscription for feature
    /// picking for as long as it stays mounted.
    pub fn set_overlay(
        &mut self,
        surface: &mut dyn MapSurface,
        subscriptions: &mut Subscriptions,
        spec: LayerSpec,
    ) -> Option<Layer> {
        let replaced = self.clear_overlay(surface, subscriptions, spec.slot);

        let layer = Layer {
            id: self.next_id(),
            slot: spec.slot,
            source: spec.source,
            style: spec.style,
        };
        surface.mount_layer(&layer);
        if layer.slot == LayerSlot::TiledOverlay {
            let key = subscriptions.subscribe(SubscriptionKind::Click);
            self.slot_subscriptions.insert(layer.slot, key);
        }
        tracing::info!("mounted {} in slot {}", layer.id, layer.slot);
        self.slots.insert(layer.slot, layer);
        replaced
    }

    /// Unmounts the slot's layer, if any, and releases its subscriptions.
    pub fn clear_overlay(
        &mut self,
        surface: &mut dyn MapSurface,
        subscriptions: &mut Subscriptions,
        slot: LayerSlot,
    ) -> Option<Layer> {
        let layer = self.slots.remove(&slot)?;
        if let Some(key) = self.slot_subscriptions.remove(&slot) {
            subscriptions.unsubscribe(key);
        }
        surface.unmount_layer(layer.id);
        tracing::info!("unmounted {} from slot {}", layer.id, slot);
        Some(layer)
    }

    pub fn get(&self, slot: LayerSlot) -> Option<&Layer> {
        self.slots.get(&slot)
    }

    pub fn is_mounted(&self, slot: LayerSlot) -> bool {
        self.slots.contains_key(&slot)
    }

    /// Mounted layers, bottom to top.
    pub fn layers(&self) -> Vec<&Layer> {
        let mut layers: Vec<&Layer> = self.slots.values().collect();
        layers.sort_by_key(|layer| layer.slot.z_index());
        layers
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Animates the camera onto the extent of the slot's vector data.
    /// Returns the target camera, or `DegenerateExtent` when there is
    /// nothing finite to fit, in which case the camera is not touched.
    pub fn fit_to_extent(
        &self,
        surface: &mut dyn MapSurface,
        slot: LayerSlot,
        camera: &Camera,
        options: FitOptions,
    ) -> MapViewResult<Camera> {
        let extent = self
            .slots
            .get(&slot)
            .and_then(Layer::vector_data)
            .and_then(|data| data.extent())
            .ok_or(MapViewError::DegenerateExtent)?;
        let target = camera.fitted(&extent, options.padding, options.max_zoom)?;
        surface.animate_camera(&target, options.duration);
        tracing::debug!(
            "fitting slot {} to extent {:?} at zoom {:.2}",
            slot,
            extent,
            target.zoom()
        );
        Ok(target)
    }

    /// Unmounts every layer, base included.
    pub fn clear_all(&mut self, surface: &mut dyn MapSurface, subscriptions: &mut Subscriptions) {
        for slot in LayerSlot::ALL.iter().rev() {
            self.clear_overlay(surface, subscriptions, *slot);
        }
    }
}
