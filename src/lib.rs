use wasm_bindgen::prelude::*;

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod view;

pub use config::MapConfig;
pub use error::{MapViewError, MapViewResult};
pub use model::{BoundingBox, DrawTrigger, GeoPoint, LayerSlot, TileSource};
pub use view::surface::{HeadlessSurface, MapSurface};
pub use view::view::{MapInputs, MapView, MapViewHandle, PointerEvent, SyncAction, diff_inputs};

#[wasm_bindgen(start)]
fn start() {
    config::init_tracing(&MapConfig::default());
    tracing::info!("landuse-map loaded");
}
