use crate::config::{MapConfig, init_tracing};
use crate::engine::tiles::TileId;
use crate::error::MapViewError;
use crate::model::{DrawTrigger, PixelPoint, PixelSize, TileSource};
use crate::view::canvas::CanvasSurface;
use crate::view::view::{MapInputs, MapView, MapViewHandle, PointerEvent};
use geojson::FeatureCollection;
use std::sync::Arc;
use wasm_bindgen::prelude::*;

fn to_js(e: MapViewError) -> JsValue {
    JsValue::from_str(&format!("Map error: {}", e))
}

fn parse_collection(json: &str) -> Result<FeatureCollection, JsValue> {
    serde_json::from_str::<FeatureCollection>(json)
        .map_err(|e| to_js(MapViewError::Serialization(e.to_string())))
}

/// Browser entry point: a map view bound to a canvas element.
#[wasm_bindgen]
pub struct WasmMapView {
    canvas_id: String,
    view: MapView<CanvasSurface>,
    inputs: MapInputs,
}

#[wasm_bindgen]
impl WasmMapView {
    /// `on_bounding_box_drawn` receives `[minLon, minLat, maxLon, maxLat]`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        canvas_id: &str,
        config_json: Option<String>,
        on_bounding_box_drawn: js_sys::Function,
    ) -> Result<WasmMapView, JsValue> {
        let config = match config_json.as_deref() {
            Some(json) => MapConfig::from_json(json).map_err(to_js)?,
            None => MapConfig::default(),
        };
        init_tracing(&config);

        let mut view = MapView::new(config).map_err(to_js)?;
        view.on_bounding_box_drawn(move |bbox| {
            let array = js_sys::Array::new();
            for value in bbox.to_array() {
                array.push(&JsValue::from_f64(value));
            }
            if let Err(e) = on_bounding_box_drawn.call1(&JsValue::NULL, &array) {
                tracing::warn!("bounding box callback threw: {:?}", e);
            }
        });

        Ok(WasmMapView {
            canvas_id: canvas_id.to_string(),
            view,
            inputs: MapInputs::default(),
        })
    }

    /// Ready signal once the canvas has a measurable size; creates the
    /// canvas surface on the first successful call. Returns whether the map
    /// is initialized after the call.
    pub fn container_ready(&mut self, width: u32, height: u32) -> Result<bool, JsValue> {
        if self.view.is_initialized() {
            return Ok(true);
        }
        let size = PixelSize::new(width, height);
        if !size.is_measurable() {
            return Ok(false);
        }
        let surface =
            CanvasSurface::from_canvas_id(&self.canvas_id, self.view.config().max_cached_tiles)
                .map_err(to_js)?;
        Ok(self.view.initialize(size, move || surface))
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.view.resize(PixelSize::new(width, height));
    }

    /// Replaces the data overlay with a GeoJSON FeatureCollection; `None`
    /// clears it.
    pub fn set_vector_data(&mut self, geojson: Option<String>) -> Result<(), JsValue> {
        self.inputs.vector_data = match geojson.as_deref() {
            Some(json) => Some(Arc::new(parse_collection(json)?)),
            None => None,
        };
        self.sync()
    }

    pub fn set_tile_source_url(&mut self, url: Option<String>) -> Result<(), JsValue> {
        self.inputs.tile_source_url = url;
        self.sync()
    }

    /// Any new non-zero value arms the draw tool; zero cancels it.
    /// Takes a JS number so `Date.now()` tokens pass through unchanged.
    pub fn set_draw_trigger(&mut self, trigger: f64) -> Result<(), JsValue> {
        self.inputs.draw_trigger = DrawTrigger::from_js_number(trigger).map_err(to_js)?;
        self.sync()
    }

    fn sync(&mut self) -> Result<(), JsValue> {
        self.view
            .reconcile(self.inputs.clone())
            .map(|actions| tracing::debug!("applied {} sync actions", actions.len()))
            .map_err(to_js)
    }

    pub fn show_tiled_overlay(&mut self, url: &str) {
        self.view.show_tiled_overlay(TileSource::new(url));
    }

    pub fn clear_tiled_overlay(&mut self) {
        self.view.clear_tiled_overlay();
    }

    pub fn request_draw(&mut self) {
        self.view.request_draw();
    }

    pub fn clear_drawn_box(&mut self) {
        self.view.clear_drawn_box();
    }

    pub fn reset_cursor(&mut self) {
        self.view.reset_cursor();
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) -> Result<(), JsValue> {
        self.pointer(PointerEvent::Down(PixelPoint::new(x, y)))
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> Result<(), JsValue> {
        self.pointer(PointerEvent::Move(PixelPoint::new(x, y)))
    }

    pub fn pointer_up(&mut self, x: f64, y: f64) -> Result<(), JsValue> {
        self.pointer(PointerEvent::Up(PixelPoint::new(x, y)))
    }

    pub fn click(&mut self, x: f64, y: f64) -> Result<(), JsValue> {
        self.pointer(PointerEvent::Click(PixelPoint::new(x, y)))
    }

    pub fn wheel(&mut self, x: f64, y: f64, delta: f64) -> Result<(), JsValue> {
        self.pointer(PointerEvent::Wheel {
            at: PixelPoint::new(x, y),
            delta,
        })
    }

    fn pointer(&mut self, event: PointerEvent) -> Result<(), JsValue> {
        self.view.handle_pointer(event).map_err(to_js)
    }

    /// Decoded features (GeoJSON, WGS84) of tile `z/x/y` of the tiled overlay.
    pub fn load_tile_features(&mut self, z: u8, x: u32, y: u32, geojson: &str) -> Result<(), JsValue> {
        let tile = TileId::new(z, x, y).map_err(to_js)?;
        let collection = parse_collection(geojson)?;
        self.view.load_tile_features(tile, &collection).map_err(to_js)
    }

    /// Tiles of the tiled overlay covering the view, as `"z/x/y"` strings.
    pub fn visible_tiles(&self) -> js_sys::Array {
        self.view
            .visible_tiles()
            .iter()
            .map(|tile| JsValue::from_str(&format!("{}/{}/{}", tile.z, tile.x, tile.y)))
            .collect()
    }

    pub fn popup_html(&self) -> Option<String> {
        self.view.popup().map(|popup| popup.to_html())
    }

    #[wasm_bindgen(getter)]
    pub fn zoom(&self) -> f64 {
        self.view.camera().zoom()
    }

    pub fn dispose(&mut self) {
        self.view.dispose();
    }
}
