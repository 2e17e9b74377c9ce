use crate::config::MapConfig;
use crate::engine::camera::Camera;
use crate::engine::draw::{BoxDraw, DrawState};
use crate::engine::drag::DragState;
use crate::engine::events::{SubscriptionKey, SubscriptionKind, Subscriptions};
use crate::engine::geometry::VectorData;
use crate::engine::picker::{self, PickOutcome};
use crate::engine::registry::{FitOptions, LayerRegistry};
use crate::engine::style;
use crate::engine::tiles::TileId;
use crate::error::{MapViewError, MapViewResult};
use crate::model::{
    BoundingBox, Cursor, DrawTrigger, GeoPoint, LayerSlot, LayerSource, LayerSpec, LayerStyle,
    PixelPoint, PixelSize, PopupState, TileSource,
};
use crate::view::surface::MapSurface;
use geojson::FeatureCollection;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Control surface the owner of a map view calls on demand.
pub trait MapViewHandle {
    /// Mounts or replaces the tiled overlay. Empty URLs are ignored.
    fn show_tiled_overlay(&mut self, source: TileSource);

    /// Removes the tiled overlay and closes any open popup.
    fn clear_tiled_overlay(&mut self);

    /// Replaces the data overlay; `None` clears it. Non-empty data moves the
    /// camera onto its extent.
    fn set_vector_data(&mut self, data: Option<&FeatureCollection>) -> MapViewResult<()>;

    /// Arms the bounding-box draw tool, discarding any unfinished draw.
    fn request_draw(&mut self);

    /// Empties the draw-scratch layer. The draw tool state is unchanged.
    fn clear_drawn_box(&mut self);

    /// Restores the default cursor and disarms the draw tool.
    fn reset_cursor(&mut self);
}

/// Values supplied by the owner whose changes drive layer synchronisation.
#[derive(Clone, Debug, Default)]
pub struct MapInputs {
    pub vector_data: Option<Arc<FeatureCollection>>,
    pub tile_source_url: Option<String>,
    pub draw_trigger: DrawTrigger,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SyncAction {
    SetVectorData(Option<Arc<FeatureCollection>>),
    ShowTiles(TileSource),
    ClearTiles,
    ArmDraw,
    CancelDraw,
}

/// Minimal set of actions turning `prev` into `next`.
///
/// Vector data is compared by identity, so handing over the same `Arc` again
/// does not remount the layer.
pub fn diff_inputs(prev: &MapInputs, next: &MapInputs) -> Vec<SyncAction> {
    let mut actions = Vec::new();

    let same_data = match (&prev.vector_data, &next.vector_data) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    };
    if !same_data {
        actions.push(SyncAction::SetVectorData(next.vector_data.clone()));
    }

    if prev.tile_source_url != next.tile_source_url {
        match next.tile_source_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => actions.push(SyncAction::ShowTiles(TileSource::new(url))),
            _ => actions.push(SyncAction::ClearTiles),
        }
    }

    if prev.draw_trigger != next.draw_trigger {
        if next.draw_trigger.is_requested() {
            actions.push(SyncAction::ArmDraw);
        } else {
            actions.push(SyncAction::CancelDraw);
        }
    }

    actions
}

/// Pointer input routed from the hosting environment, in container pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down(PixelPoint),
    Move(PixelPoint),
    Up(PixelPoint),
    /// Press and release without movement in between.
    Click(PixelPoint),
    Wheel { at: PixelPoint, delta: f64 },
}

pub type BoundingBoxCallback = Box<dyn FnMut(BoundingBox)>;

/// The interactive map controller.
///
/// Owns the surface, the layer registry, the draw tool, and the popup.
/// Every public method runs to completion synchronously, so a slot
/// replacement is finished before the next event is handled.
pub struct MapView<S: MapSurface> {
    config: MapConfig,
    surface: Option<S>,
    camera: Camera,
    layers: LayerRegistry,
    subscriptions: Subscriptions,
    resize_key: Option<SubscriptionKey>,
    draw: BoxDraw,
    pan: DragState,
    popup: Option<PopupState>,
    applied: MapInputs,
    desired: MapInputs,
    draw_generation: DrawTrigger,
    on_bounding_box_drawn: Option<BoundingBoxCallback>,
    disposed: bool,
}

impl<S: MapSurface + fmt::Debug> fmt::Debug for MapView<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapView")
            .field("surface", &self.surface)
            .field("camera", &self.camera)
            .field("layers", &self.layers)
            .field("draw", &self.draw)
            .field("popup", &self.popup)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl<S: MapSurface> MapView<S> {
    pub fn new(config: MapConfig) -> MapViewResult<Self> {
        config.validate()?;
        let [lon, lat] = config.initial_center;
        let camera = Camera::from_lon_lat(
            GeoPoint::new(lon, lat),
            config.initial_zoom,
            PixelSize::default(),
        )?;
        Ok(MapView {
            config,
            surface: None,
            camera,
            layers: LayerRegistry::new(),
            subscriptions: Subscriptions::new(),
            resize_key: None,
            draw: BoxDraw::new(),
            pan: DragState::default(),
            popup: None,
            applied: MapInputs::default(),
            desired: MapInputs::default(),
            draw_generation: DrawTrigger::default(),
            on_bounding_box_drawn: None,
            disposed: false,
        })
    }

    pub fn on_bounding_box_drawn(&mut self, callback: impl FnMut(BoundingBox) + 'static) {
        self.on_bounding_box_drawn = Some(Box::new(callback));
    }

    /// Ready signal from the host once the container has a measurable size.
    ///
    /// Creates the surface through `create` on the first successful call
    /// only; returns whether this call initialized the view. Inputs handed to
    /// [`MapView::reconcile`] earlier are applied right away.
    pub fn initialize(&mut self, size: PixelSize, create: impl FnOnce() -> S) -> bool {
        if self.disposed {
            tracing::warn!("initialize called on a disposed map view");
            return false;
        }
        if self.surface.is_some() {
            tracing::debug!("map surface already initialized");
            return false;
        }
        if !size.is_measurable() {
            tracing::debug!("container not measurable yet ({}x{})", size.width, size.height);
            return false;
        }

        let mut surface = create();
        self.camera.resize(size);
        self.layers.set_base_layer(&mut surface, &self.config.base_tile_url);
        self.layers.set_overlay(
            &mut surface,
            &mut self.subscriptions,
            LayerSpec::new(
                LayerSlot::DrawScratch,
                LayerSource::Scratch,
                style::draw_scratch_style(),
            ),
        );
        surface.set_cursor(Cursor::Default);
        surface.animate_camera(&self.camera, Duration::ZERO);
        self.resize_key = Some(self.subscriptions.subscribe(SubscriptionKind::Resize));
        self.surface = Some(surface);
        tracing::info!(
            "map surface initialized at {}x{}, zoom {:.2}",
            size.width,
            size.height,
            self.camera.zoom()
        );

        if let Err(e) = self.sync_inputs() {
            tracing::warn!("applying pending inputs failed: {}", e);
        }
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn layers(&self) -> &LayerRegistry {
        &self.layers
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    pub fn draw_state(&self) -> DrawState {
        self.draw.state()
    }

    pub fn popup(&self) -> Option<&PopupState> {
        self.popup.as_ref()
    }

    /// Number of draw requests issued through [`MapViewHandle::request_draw`].
    pub fn draw_generation(&self) -> DrawTrigger {
        self.draw_generation
    }

    /// Applies whatever changed between the last applied inputs and `inputs`.
    ///
    /// Before initialization the inputs are only remembered. All actions are
    /// attempted; the first error is returned.
    pub fn reconcile(&mut self, inputs: MapInputs) -> MapViewResult<Vec<SyncAction>> {
        self.desired = inputs;
        if self.surface.is_none() {
            tracing::debug!("reconcile deferred until the surface is ready");
            return Ok(Vec::new());
        }
        self.sync_inputs()
    }

    fn sync_inputs(&mut self) -> MapViewResult<Vec<SyncAction>> {
        let actions = diff_inputs(&self.applied, &self.desired);
        self.applied = self.desired.clone();

        let mut first_error = None;
        for action in &actions {
            if let Err(e) = self.apply(action) {
                tracing::warn!("sync action {:?} failed: {}", action, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(actions),
        }
    }

    fn apply(&mut self, action: &SyncAction) -> MapViewResult<()> {
        match action {
            SyncAction::SetVectorData(data) => self.set_vector_data(data.as_deref())?,
            SyncAction::ShowTiles(source) => self.show_tiled_overlay(source.clone()),
            SyncAction::ClearTiles => self.clear_tiled_overlay(),
            SyncAction::ArmDraw => self.arm_draw(),
            SyncAction::CancelDraw => self.disarm_draw(),
        }
        Ok(())
    }

    /// Container size changed. Ignored until initialized or once disposed.
    pub fn resize(&mut self, size: PixelSize) {
        let listening = self
            .resize_key
            .is_some_and(|key| self.subscriptions.is_live(key));
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        if !listening || !size.is_measurable() {
            return;
        }
        self.camera.resize(size);
        surface.animate_camera(&self.camera, Duration::ZERO);
    }

    /// Pushes decoded features of one tile of the mounted tiled overlay.
    /// Tiles arriving while no tiled overlay is mounted are dropped.
    pub fn load_tile_features(
        &mut self,
        tile: TileId,
        collection: &FeatureCollection,
    ) -> MapViewResult<()> {
        let surface = self
            .surface
            .as_mut()
            .ok_or(MapViewError::UninitializedSurface)?;
        // Tiles requested for an overlay that has since been cleared
        let Some(layer) = self.layers.get(LayerSlot::TiledOverlay) else {
            tracing::debug!("dropping tile {}/{}/{}: no tiled overlay", tile.z, tile.x, tile.y);
            return Ok(());
        };
        surface.insert_tile_features(layer.id, tile, VectorData::from_geojson(collection)?)
    }

    /// Tiles of the mounted tiled overlay that cover the current view.
    pub fn visible_tiles(&self) -> Vec<TileId> {
        if !self.layers.is_mounted(LayerSlot::TiledOverlay) {
            return Vec::new();
        }
        let z = self.camera.tile_zoom().min(self.config.max_zoom as u8);
        TileId::covering(&self.camera.visible_extent(), z)
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> MapViewResult<()> {
        if self.surface.is_none() {
            return Ok(());
        }
        match event {
            PointerEvent::Down(at) => self.pointer_down(at),
            PointerEvent::Move(at) => self.pointer_move(at),
            PointerEvent::Up(at) => return self.pointer_up(at),
            PointerEvent::Click(at) => self.click(at),
            PointerEvent::Wheel { at, delta } => self.wheel(at, delta),
        }
        Ok(())
    }

    fn pointer_down(&mut self, at: PixelPoint) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        match self.draw.state() {
            DrawState::Armed => {
                if self.draw.begin(self.camera.pixel_to_render(at)) {
                    surface.set_scratch(self.draw.scratch(), true);
                }
            }
            DrawState::Idle => {
                self.pan.start(at);
                surface.set_cursor(Cursor::Grabbing);
            }
            DrawState::Drawing { .. } => {}
        }
    }

    fn pointer_move(&mut self, at: PixelPoint) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        if self.draw.is_drawing() {
            if let Some(rect) = self.draw.update(self.camera.pixel_to_render(at)) {
                surface.set_scratch(Some(rect), true);
            }
        } else if let Some((dx, dy)) = self.pan.update(at) {
            self.camera.pan_by_pixels(dx, dy);
            surface.animate_camera(&self.camera, Duration::ZERO);
        }
    }

    fn pointer_up(&mut self, at: PixelPoint) -> MapViewResult<()> {
        let Some(surface) = self.surface.as_mut() else {
            return Ok(());
        };
        if self.pan.is_dragging() {
            self.pan.end();
            surface.set_cursor(self.draw.cursor());
            return Ok(());
        }
        if !self.draw.is_drawing() {
            return Ok(());
        }

        let committed = self
            .draw
            .commit(self.camera.pixel_to_render(at), &mut self.subscriptions);
        surface.set_scratch(self.draw.scratch(), false);
        surface.set_cursor(self.draw.cursor());

        if let Some(bbox) = committed? {
            tracing::info!("bounding box drawn: {}", bbox);
            match self.on_bounding_box_drawn.as_mut() {
                Some(callback) => callback(bbox),
                None => tracing::warn!("bounding box drawn without a listener"),
            }
        }
        Ok(())
    }

    fn click(&mut self, at: PixelPoint) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let tiled_overlay = self
            .layers
            .get(LayerSlot::TiledOverlay)
            .map(|layer| layer.id)
            .filter(|_| self.subscriptions.has(SubscriptionKind::Click));
        let outcome = picker::pick(
            &*surface,
            self.draw.is_active(),
            tiled_overlay,
            self.camera.pixel_to_render(at),
            self.config.hit_tolerance_px * self.camera.resolution,
        );
        match outcome {
            PickOutcome::Ignored => {}
            PickOutcome::Cleared => {
                self.popup = None;
                surface.show_popup(None, self.config.popup_autopan());
            }
            PickOutcome::Opened(popup) => {
                tracing::debug!("popup opened for {:?}", popup.field("Name"));
                surface.show_popup(Some(&popup), self.config.popup_autopan());
                self.popup = Some(popup);
            }
        }
    }

    fn wheel(&mut self, at: PixelPoint, delta: f64) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        if self.draw.is_drawing() || !delta.is_finite() {
            return;
        }
        self.camera
            .zoom_at(at, delta, (self.config.min_zoom, self.config.max_zoom));
        surface.animate_camera(&self.camera, Duration::ZERO);
    }

    fn close_popup(&mut self) {
        let had_popup = self.popup.take().is_some();
        if let Some(surface) = self.surface.as_mut() {
            if had_popup {
                surface.show_popup(None, Duration::ZERO);
            }
        }
    }

    fn arm_draw(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            tracing::debug!("draw requested before the surface is ready");
            return;
        };
        self.pan.end();
        self.draw.arm(&mut self.subscriptions);
        surface.set_scratch(None, false);
        surface.set_cursor(Cursor::Crosshair);
        self.close_popup();
    }

    fn disarm_draw(&mut self) {
        self.draw.cancel(&mut self.subscriptions, false);
        if let Some(surface) = self.surface.as_mut() {
            surface.set_scratch(self.draw.scratch(), false);
            surface.set_cursor(Cursor::Default);
        }
    }

    /// Releases every subscription and the surface. The view stays inert
    /// afterwards; calling this twice is harmless.
    pub fn dispose(&mut self) {
        let Some(mut surface) = self.surface.take() else {
            self.disposed = true;
            return;
        };
        self.draw.cancel(&mut self.subscriptions, true);
        self.pan.end();
        self.layers.clear_all(&mut surface, &mut self.subscriptions);
        self.subscriptions.clear();
        self.resize_key = None;
        self.popup = None;
        surface.dispose();
        self.disposed = true;
        tracing::info!("map view disposed");
    }
}

impl<S: MapSurface> MapViewHandle for MapView<S> {
    fn show_tiled_overlay(&mut self, source: TileSource) {
        let Some(surface) = self.surface.as_mut() else {
            tracing::debug!("show_tiled_overlay ignored: {}", MapViewError::UninitializedSurface);
            return;
        };
        if source.is_empty() {
            tracing::debug!("show_tiled_overlay ignored: empty url");
            return;
        }
        let url = source.url.clone();
        let replaced = self.layers.set_overlay(
            surface,
            &mut self.subscriptions,
            LayerSpec::new(
                LayerSlot::TiledOverlay,
                LayerSource::Tiles(source),
                LayerStyle::ByLanduse,
            ),
        );
        if replaced.is_some() {
            self.close_popup();
        }
        tracing::info!("tiled overlay showing {}", url);
    }

    fn clear_tiled_overlay(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        self.layers
            .clear_overlay(surface, &mut self.subscriptions, LayerSlot::TiledOverlay);
        self.close_popup();
    }

    fn set_vector_data(&mut self, data: Option<&FeatureCollection>) -> MapViewResult<()> {
        let Some(surface) = self.surface.as_mut() else {
            tracing::debug!("set_vector_data ignored: {}", MapViewError::UninitializedSurface);
            return Ok(());
        };
        let Some(collection) = data else {
            self.layers
                .clear_overlay(surface, &mut self.subscriptions, LayerSlot::DataOverlay);
            return Ok(());
        };

        let data = Arc::new(VectorData::from_geojson(collection)?);
        let has_features = !data.is_empty();
        tracing::info!("data overlay with {} features", data.len());
        self.layers.set_overlay(
            surface,
            &mut self.subscriptions,
            LayerSpec::new(
                LayerSlot::DataOverlay,
                LayerSource::Vector(data),
                style::data_overlay_style(),
            ),
        );

        if has_features {
            let options = FitOptions {
                padding: self.config.fit_padding_px,
                duration: self.config.fit_duration(),
                max_zoom: self.config.max_zoom,
            };
            match self
                .layers
                .fit_to_extent(surface, LayerSlot::DataOverlay, &self.camera, options)
            {
                Ok(target) => self.camera = target,
                Err(e) => tracing::debug!("camera fit skipped: {}", e),
            }
        }
        Ok(())
    }

    fn request_draw(&mut self) {
        self.draw_generation = self.draw_generation.next();
        self.arm_draw();
    }

    fn clear_drawn_box(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        self.draw.clear_scratch();
        surface.set_scratch(None, false);
    }

    fn reset_cursor(&mut self) {
        self.pan.end();
        self.disarm_draw();
    }
}
