use crate::engine::tiles::MAX_TILE_ZOOM;
use crate::engine::transforms::{
    HALF_WORLD, fit_resolution, resolution_for_zoom, to_render, zoom_for_resolution,
};
use crate::error::{MapViewError, MapViewResult};
use crate::model::{Extent, GeoPoint, PixelPoint, PixelSize, RenderPoint};

/// What the surface shows: a center in render projection, a resolution in
/// render units per pixel, and the pixel size of the container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub center: RenderPoint,
    pub resolution: f64,
    pub size: PixelSize,
}

impl Camera {
    pub fn from_lon_lat(center: GeoPoint, zoom: f64, size: PixelSize) -> MapViewResult<Self> {
        Ok(Camera {
            center: to_render(center)?,
            resolution: resolution_for_zoom(zoom),
            size,
        })
    }

    pub fn zoom(&self) -> f64 {
        zoom_for_resolution(self.resolution)
    }

    /// Tile pyramid level drawn at this camera: the floor of the zoom.
    pub fn tile_zoom(&self) -> u8 {
        // zoom() of an integral level can land just below it
        (self.zoom() + 1e-6).floor().clamp(0.0, MAX_TILE_ZOOM as f64) as u8
    }

    fn half_size(&self) -> (f64, f64) {
        (self.size.width as f64 / 2.0, self.size.height as f64 / 2.0)
    }

    pub fn pixel_to_render(&self, pixel: PixelPoint) -> RenderPoint {
        let (half_width, half_height) = self.half_size();
        RenderPoint::new(
            self.center.x + (pixel.x - half_width) * self.resolution,
            self.center.y - (pixel.y - half_height) * self.resolution,
        )
    }

    pub fn render_to_pixel(&self, point: RenderPoint) -> PixelPoint {
        let (half_width, half_height) = self.half_size();
        PixelPoint::new(
            half_width + (point.x - self.center.x) / self.resolution,
            half_height - (point.y - self.center.y) / self.resolution,
        )
    }

    pub fn visible_extent(&self) -> Extent {
        let (half_width, half_height) = self.half_size();
        Extent::new(
            self.center.x - half_width * self.resolution,
            self.center.y - half_height * self.resolution,
            self.center.x + half_width * self.resolution,
            self.center.y + half_height * self.resolution,
        )
    }

    pub fn resize(&mut self, size: PixelSize) {
        self.size = size;
    }

    /// Moves the view so the content follows a pointer moving by `dx, dy` pixels.
    pub fn pan_by_pixels(&mut self, dx: f64, dy: f64) {
        self.center = clamp_center(RenderPoint::new(
            self.center.x - dx * self.resolution,
            self.center.y + dy * self.resolution,
        ));
    }

    /// Zooms by `delta` levels keeping the point under `anchor` fixed on screen.
    pub fn zoom_at(&mut self, anchor: PixelPoint, delta: f64, zoom_range: (f64, f64)) {
        let (min_zoom, max_zoom) = zoom_range;
        let target_zoom = (self.zoom() + delta).clamp(min_zoom, max_zoom);
        let anchor_render = self.pixel_to_render(anchor);
        self.resolution = resolution_for_zoom(target_zoom);
        let (half_width, half_height) = self.half_size();
        self.center = clamp_center(RenderPoint::new(
            anchor_render.x - (anchor.x - half_width) * self.resolution,
            anchor_render.y + (anchor.y - half_height) * self.resolution,
        ));
    }

    /// Camera showing all of `extent` with `padding` pixels kept free on each side.
    /// Zero-area extents are shown at `max_zoom`.
    pub fn fitted(&self, extent: &Extent, padding: f64, max_zoom: f64) -> MapViewResult<Camera> {
        let resolution = fit_resolution(
            extent,
            (self.size.width as f64, self.size.height as f64),
            padding,
        )
        .ok_or(MapViewError::DegenerateExtent)?;
        let resolution = resolution.max(resolution_for_zoom(max_zoom));
        Ok(Camera {
            center: extent.center(),
            resolution,
            size: self.size,
        })
    }
}

fn clamp_center(center: RenderPoint) -> RenderPoint {
    RenderPoint::new(
        center.x.clamp(-HALF_WORLD, HALF_WORLD),
        center.y.clamp(-HALF_WORLD, HALF_WORLD),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera {
            center: RenderPoint::new(1000.0, 2000.0),
            resolution: 10.0,
            size: PixelSize::new(200, 100),
        }
    }

    #[test]
    fn pixel_center_is_camera_center() {
        let camera = camera();
        assert_eq!(
            camera.pixel_to_render(PixelPoint::new(100.0, 50.0)),
            camera.center
        );
    }

    #[test]
    fn pixel_y_grows_downwards() {
        let camera = camera();
        let top_left = camera.pixel_to_render(PixelPoint::new(0.0, 0.0));
        assert_eq!(top_left, RenderPoint::new(0.0, 2500.0));
        assert_eq!(
            camera.render_to_pixel(top_left),
            PixelPoint::new(0.0, 0.0)
        );
    }

    #[test]
    fn visible_extent_matches_size() {
        let extent = camera().visible_extent();
        assert_eq!(extent, Extent::new(0.0, 1500.0, 2000.0, 2500.0));
    }

    #[test]
    fn pan_moves_content_with_pointer() {
        let mut camera = camera();
        let before = camera.pixel_to_render(PixelPoint::new(10.0, 10.0));
        camera.pan_by_pixels(5.0, -3.0);
        let after = camera.pixel_to_render(PixelPoint::new(15.0, 7.0));
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let mut camera = camera();
        let anchor = PixelPoint::new(40.0, 80.0);
        let before = camera.pixel_to_render(anchor);
        camera.zoom_at(anchor, 1.0, (0.0, 28.0));
        let after = camera.pixel_to_render(anchor);
        assert!((before.x - after.x).abs() < 1e-6, "{:?} {:?}", before, after);
        assert!((before.y - after.y).abs() < 1e-6, "{:?} {:?}", before, after);
    }

    #[test]
    fn zoom_is_clamped_to_range() {
        let mut camera = camera();
        camera.zoom_at(PixelPoint::new(100.0, 50.0), 40.0, (0.0, 18.0));
        assert!((camera.zoom() - 18.0).abs() < 1e-9);
    }

    #[test]
    fn fit_point_extent_uses_max_zoom() {
        let camera = camera();
        let point = RenderPoint::new(5.0, 5.0);
        let fitted = camera
            .fitted(&Extent::from_corners(point, point), 24.0, 20.0)
            .unwrap();
        assert_eq!(fitted.center, point);
        assert!((fitted.zoom() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn fit_empty_extent_is_degenerate() {
        assert_eq!(
            camera().fitted(&Extent::empty(), 24.0, 20.0),
            Err(MapViewError::DegenerateExtent)
        );
    }

    #[test]
    fn tile_zoom_is_the_floor_of_the_zoom() {
        let mut camera = camera();
        camera.resolution = resolution_for_zoom(6.0);
        assert_eq!(camera.tile_zoom(), 6);
        camera.resolution = resolution_for_zoom(6.99);
        assert_eq!(camera.tile_zoom(), 6);
        camera.resolution = resolution_for_zoom(-1.0);
        assert_eq!(camera.tile_zoom(), 0);
    }
}
