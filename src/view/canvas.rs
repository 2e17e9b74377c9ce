use crate::engine::camera::Camera;
use crate::engine::geometry::VectorData;
use crate::engine::renderer::{self, draw_geometry};
use crate::engine::style;
use crate::engine::tiles::{MAX_TILE_ZOOM, TileFeatureCache, TileId};
use crate::error::{MapViewError, MapViewResult};
use crate::model::{
    Cursor, Extent, FeatureProperties, Layer, LayerId, LayerSlot, PixelSize, PopupState,
    RenderPoint, Style,
};
use crate::view::surface::{MapSurface, insert_ordered, is_tiled_overlay, layer_features_at};
use std::time::Duration;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

const BACKGROUND: &str = "#f2efe9";
// Base tile outlines get too dense to be useful beyond this zoom
const MAX_GRID_ZOOM: u8 = 18;

/// [`MapSurface`] drawing onto an HTML canvas with the 2D context.
///
/// Camera moves are applied immediately; animation durations are only
/// logged.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    layers: Vec<Layer>,
    camera: Option<Camera>,
    scratch: Option<Extent>,
    sketching: bool,
    popup: Option<PopupState>,
    tiles: TileFeatureCache,
}

impl std::fmt::Debug for CanvasSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasSurface")
            .field("canvas", &self.canvas.id())
            .field("layers", &self.layers)
            .field("camera", &self.camera)
            .field("cached_tiles", &self.tiles.len())
            .finish()
    }
}

impl CanvasSurface {
    pub fn from_canvas_id(canvas_id: &str, max_cached_tiles: usize) -> MapViewResult<Self> {
        let document = web_sys::window()
            .ok_or_else(|| MapViewError::Wasm("No window".to_string()))?
            .document()
            .ok_or_else(|| MapViewError::Wasm("No document".to_string()))?;

        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| MapViewError::Wasm(format!("Canvas {} not found", canvas_id)))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| MapViewError::Wasm("Element is not a canvas".to_string()))?;

        Self::new(canvas, max_cached_tiles)
    }

    pub fn new(canvas: HtmlCanvasElement, max_cached_tiles: usize) -> MapViewResult<Self> {
        let context = canvas
            .get_context("2d")
            .map_err(|_| MapViewError::Wasm("Could not get 2d context".to_string()))?
            .ok_or_else(|| MapViewError::Wasm("No 2d context".to_string()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| MapViewError::Wasm("Context is not 2d".to_string()))?;

        Ok(CanvasSurface {
            canvas,
            context,
            layers: Vec::new(),
            camera: None,
            scratch: None,
            sketching: false,
            popup: None,
            tiles: TileFeatureCache::new(max_cached_tiles),
        })
    }

    fn sync_canvas_size(&self, size: PixelSize) {
        if self.canvas.width() != size.width {
            self.canvas.set_width(size.width);
        }
        if self.canvas.height() != size.height {
            self.canvas.set_height(size.height);
        }
    }

    pub fn redraw(&self) {
        if let Err(e) = self.render() {
            tracing::warn!("canvas redraw failed: {}", e);
        }
    }

    fn render(&self) -> MapViewResult<()> {
        let Some(camera) = self.camera.as_ref() else {
            return Ok(());
        };
        let size = (camera.size.width as f64, camera.size.height as f64);
        renderer::clear_canvas(&self.context, size)?;
        renderer::draw_background(&self.context, size, BACKGROUND)?;

        for layer in &self.layers {
            match layer.slot {
                LayerSlot::Base => {
                    let z = camera.tile_zoom().min(MAX_GRID_ZOOM);
                    renderer::draw_tile_grid(&self.context, camera, z)?;
                }
                LayerSlot::DataOverlay => {
                    if let Some(data) = layer.vector_data() {
                        self.draw_features(camera, layer, data)?;
                    }
                }
                LayerSlot::TiledOverlay => {
                    for (_, data) in self.tiles.iter_level(camera.tile_zoom()) {
                        self.draw_features(camera, layer, data)?;
                    }
                }
                LayerSlot::DrawScratch => {
                    let style = if self.sketching {
                        Some(style::draw_sketch_style())
                    } else {
                        layer.style_for(&FeatureProperties::new())
                    };
                    if let (Some(extent), Some(style)) = (self.scratch, style) {
                        renderer::draw_extent(&self.context, camera, &extent, &style)?;
                    }
                }
            }
        }

        if let Some(popup) = &self.popup {
            let marker = Style {
                fill: Some("#ffffff".to_string()),
                stroke: "#333".to_string(),
                stroke_width: 2.0,
            };
            renderer::draw_point(&self.context, camera, popup.anchor.into(), &marker)?;
        }
        Ok(())
    }

    fn draw_features(&self, camera: &Camera, layer: &Layer, data: &VectorData) -> MapViewResult<()> {
        let visible = camera.visible_extent();
        data.features()
            .iter()
            .filter(|feature| {
                feature
                    .extent()
                    .is_some_and(|extent| overlaps(&visible, &extent))
            })
            .try_for_each(|feature| match layer.style_for(&feature.properties) {
                Some(style) => draw_geometry(&self.context, camera, &feature.geometry, &style),
                None => Ok(()),
            })
    }
}

fn overlaps(a: &Extent, b: &Extent) -> bool {
    a.min_x <= b.max_x && b.min_x <= a.max_x && a.min_y <= b.max_y && b.min_y <= a.max_y
}

impl MapSurface for CanvasSurface {
    fn mount_layer(&mut self, layer: &Layer) {
        insert_ordered(&mut self.layers, layer);
        self.redraw();
    }

    fn unmount_layer(&mut self, id: LayerId) {
        if is_tiled_overlay(&self.layers, id) {
            self.tiles.clear();
        }
        self.layers.retain(|layer| layer.id != id);
        self.redraw();
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        if let Err(e) = self.canvas.style().set_property("cursor", cursor.css()) {
            tracing::warn!("failed to set cursor: {:?}", e);
        }
    }

    fn set_scratch(&mut self, rect: Option<Extent>, sketching: bool) {
        self.scratch = rect;
        self.sketching = sketching && rect.is_some();
        self.redraw();
    }

    fn animate_camera(&mut self, camera: &Camera, duration: Duration) {
        if !duration.is_zero() {
            tracing::debug!("camera move over {:?} applied immediately", duration);
        }
        self.sync_canvas_size(camera.size);
        self.camera = Some(*camera);
        self.redraw();
    }

    fn features_at(&self, id: LayerId, point: RenderPoint, tolerance: f64) -> Vec<FeatureProperties> {
        layer_features_at(&self.layers, &self.tiles, self.camera.as_ref(), id, point, tolerance)
    }

    fn show_popup(&mut self, popup: Option<&PopupState>, autopan: Duration) {
        self.popup = popup.cloned();
        if let (Some(popup), Some(camera)) = (&self.popup, self.camera.as_ref()) {
            if !camera.visible_extent().contains(popup.anchor) {
                tracing::debug!("popup anchor outside view, autopan {:?} not applied", autopan);
            }
        }
        self.redraw();
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
        if tile.z > MAX_TILE_ZOOM {
            return Err(MapViewError::Serialization(format!("tile zoom {} out of range", tile.z)));
        }
        self.tiles.insert(tile, data);
        self.redraw();
        Ok(())
    }

    fn dispose(&mut self) {
        self.layers.clear();
        self.tiles.clear();
        self.popup = None;
        self.scratch = None;
        self.set_cursor(Cursor::Default);
        if let Some(camera) = self.camera.take() {
            let size = (camera.size.width as f64, camera.size.height as f64);
            if let Err(e) = renderer::clear_canvas(&self.context, size) {
                tracing::warn!("failed to clear canvas: {}", e);
            }
        }
    }
}
