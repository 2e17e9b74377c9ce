use crate::engine::camera::Camera;
use crate::engine::geometry::VectorData;
use crate::engine::tiles::{TileFeatureCache, TileId};
use crate::error::{MapViewError, MapViewResult};
use crate::model::{
    Cursor, Extent, FeatureProperties, Layer, LayerId, LayerSlot, PopupState, RenderPoint,
};
use std::time::Duration;

/// The rendering target a [`MapView`](crate::view::view::MapView) drives.
///
/// Implementations only draw what they are told; all state decisions are
/// made by the controller, which is the sole caller of these methods.
pub trait MapSurface {
    fn mount_layer(&mut self, layer: &Layer);

    fn unmount_layer(&mut self, id: LayerId);

    fn set_cursor(&mut self, cursor: Cursor);

    /// Replaces the draw-scratch geometry. `sketching` is true while the
    /// rectangle is still following the pointer.
    fn set_scratch(&mut self, rect: Option<Extent>, sketching: bool);

    fn animate_camera(&mut self, camera: &Camera, duration: Duration);

    /// Rendered features of layer `id` under `point`, topmost first.
    fn features_at(&self, id: LayerId, point: RenderPoint, tolerance: f64) -> Vec<FeatureProperties>;

    fn show_popup(&mut self, popup: Option<&PopupState>, autopan: Duration);

    /// Stores decoded features of one tile of the tiled overlay `id`.
    fn insert_tile_features(&mut self, id: LayerId, tile: TileId, data: VectorData)
    -> MapViewResult<()>;

    /// Called once when the controller is disposed.
    fn dispose(&mut self) {}
}

// Layers in slot z-order, with replacement of an id already present
pub(crate) fn insert_ordered(layers: &mut Vec<Layer>, layer: &Layer) {
    layers.retain(|mounted| mounted.id != layer.id);
    let position = layers
        .iter()
        .position(|mounted| mounted.slot.z_index() > layer.slot.z_index())
        .unwrap_or(layers.len());
    layers.insert(position, layer.clone());
}

// Hit-test shared by the surfaces: tiled overlays answer from the tile cache,
// vector layers from their own data.
pub(crate) fn layer_features_at(
    layers: &[Layer],
    tiles: &TileFeatureCache,
    camera: Option<&Camera>,
    id: LayerId,
    point: RenderPoint,
    tolerance: f64,
) -> Vec<FeatureProperties> {
    let Some(layer) = layers.iter().find(|layer| layer.id == id) else {
        return Vec::new();
    };
    let features = match layer.slot {
        // Only tiles of the level on screen can be hit
        LayerSlot::TiledOverlay => camera
            .map(|camera| tiles.features_at(point, tolerance, camera.tile_zoom()))
            .unwrap_or_default(),
        _ => layer
            .vector_data()
            .map(|data| data.features_at(point, tolerance))
            .unwrap_or_default(),
    };
    features
        .into_iter()
        .map(|feature| feature.properties.clone())
        .collect()
}

pub(crate) fn is_tiled_overlay(layers: &[Layer], id: LayerId) -> bool {
    layers
        .iter()
        .any(|layer| layer.id == id && layer.slot == LayerSlot::TiledOverlay)
}

/// In-memory surface: keeps what a real surface would draw and answers
/// hit-tests from tile features pushed by the host.
#[derive(Debug)]
pub struct HeadlessSurface {
    layers: Vec<Layer>,
    cursor: Cursor,
    scratch: Option<Extent>,
    sketching: bool,
    camera: Option<Camera>,
    animations: Vec<(Camera, Duration)>,
    popup: Option<PopupState>,
    tiles: TileFeatureCache,
    max_layers_per_slot: usize,
    disposed: bool,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new(512)
    }
}

impl HeadlessSurface {
    pub fn new(max_cached_tiles: usize) -> Self {
        HeadlessSurface {
            layers: Vec::new(),
            cursor: Cursor::Default,
            scratch: None,
            sketching: false,
            camera: None,
            animations: Vec::new(),
            popup: None,
            tiles: TileFeatureCache::new(max_cached_tiles),
            max_layers_per_slot: 0,
            disposed: false,
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_in(&self, slot: LayerSlot) -> Vec<&Layer> {
        self.layers.iter().filter(|layer| layer.slot == slot).collect()
    }

    /// Highest number of layers ever seen in one slot after any mount.
    pub fn max_layers_per_slot(&self) -> usize {
        self.max_layers_per_slot
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn scratch(&self) -> Option<Extent> {
        self.scratch
    }

    pub fn is_sketching(&self) -> bool {
        self.sketching
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn animations(&self) -> &[(Camera, Duration)] {
        &self.animations
    }

    pub fn popup(&self) -> Option<&PopupState> {
        self.popup.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn cached_tiles(&self) -> usize {
        self.tiles.len()
    }
}

impl MapSurface for HeadlessSurface {
    fn mount_layer(&mut self, layer: &Layer) {
        insert_ordered(&mut self.layers, layer);
        let in_slot = self.layers_in(layer.slot).len();
        self.max_layers_per_slot = self.max_layers_per_slot.max(in_slot);
    }

    fn unmount_layer(&mut self, id: LayerId) {
        let removed_tiles = is_tiled_overlay(&self.layers, id);
        self.layers.retain(|layer| layer.id != id);
        if removed_tiles {
            self.tiles.clear();
        }
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    fn set_scratch(&mut self, rect: Option<Extent>, sketching: bool) {
        self.scratch = rect;
        self.sketching = sketching && rect.is_some();
    }

    fn animate_camera(&mut self, camera: &Camera, duration: Duration) {
        self.camera = Some(*camera);
        if !duration.is_zero() {
            self.animations.push((*camera, duration));
        }
    }

    fn features_at(&self, id: LayerId, point: RenderPoint, tolerance: f64) -> Vec<FeatureProperties> {
        layer_features_at(&self.layers, &self.tiles, self.camera.as_ref(), id, point, tolerance)
    }

    fn show_popup(&mut self, popup: Option<&PopupState>, _autopan: Duration) {
        self.popup = popup.cloned();
    }

    fn insert_tile_features(
        &mut self,
        id: LayerId,
        tile: TileId,
        data: VectorData,
    ) -> MapViewResult<()> {
        if !is_tiled_overlay(&self.layers, id) {
            return Err(MapViewError::Serialization(format!(
                "{} is not a mounted tiled overlay",
                id
            )));
        }
        self.tiles.insert(tile, data);
        Ok(())
    }

    fn dispose(&mut self) {
        self.layers.clear();
        self.tiles.clear();
        self.popup = None;
        self.scratch = None;
        self.cursor = Cursor::Default;
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LayerSource, LayerStyle, TileSource};

    fn layer(id: u64, slot: LayerSlot) -> Layer {
        Layer {
            id: LayerId(id),
            slot,
            source: LayerSource::Scratch,
            style: LayerStyle::Unstyled,
        }
    }

    #[test]
    fn layers_are_kept_in_slot_order() {
        let mut surface = HeadlessSurface::default();
        surface.mount_layer(&layer(1, LayerSlot::DrawScratch));
        surface.mount_layer(&layer(2, LayerSlot::Base));
        surface.mount_layer(&layer(3, LayerSlot::DataOverlay));
        let slots: Vec<_> = surface.layers().iter().map(|layer| layer.slot).collect();
        assert_eq!(
            slots,
            vec![LayerSlot::Base, LayerSlot::DataOverlay, LayerSlot::DrawScratch]
        );
    }

    #[test]
    fn tile_features_need_a_tiled_overlay() {
        let mut surface = HeadlessSurface::default();
        let tile = TileId::new(0, 0, 0).unwrap();
        assert!(surface
            .insert_tile_features(LayerId(7), tile, VectorData::default())
            .is_err());

        surface.mount_layer(&Layer {
            id: LayerId(7),
            slot: LayerSlot::TiledOverlay,
            source: LayerSource::Tiles(TileSource::new("https://x/tiles.pmtiles")),
            style: LayerStyle::ByLanduse,
        });
        assert!(surface
            .insert_tile_features(LayerId(7), tile, VectorData::default())
            .is_ok());
        assert_eq!(surface.cached_tiles(), 1);

        surface.unmount_layer(LayerId(7));
        assert_eq!(surface.cached_tiles(), 0);
    }

    #[test]
    fn interactive_moves_are_not_recorded_as_animations() {
        let mut surface = HeadlessSurface::default();
        let camera = Camera {
            center: RenderPoint::new(0.0, 0.0),
            resolution: 1.0,
            size: crate::model::PixelSize::new(10, 10),
        };
        surface.animate_camera(&camera, Duration::ZERO);
        surface.animate_camera(&camera, Duration::from_millis(400));
        assert_eq!(surface.animations().len(), 1);
        assert_eq!(surface.camera(), Some(&camera));
    }
}
