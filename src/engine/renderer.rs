#![allow(non_upper_case_globals)]

//! 2D canvas drawing of projected geometries.
//!
//! Everything here takes render coordinates and a [`Camera`]; the camera
//! maps them to canvas pixels.

use crate::engine::camera::Camera;
use crate::engine::tiles::TileId;
use crate::error::{MapViewError, MapViewResult};
use crate::model::{Extent, Style};
use geo::{Coord, Geometry, LineString, Polygon};
use web_sys::CanvasRenderingContext2d;

const POINT_RADIUS: f64 = 4.0;

pub const clear_canvas: fn(&CanvasRenderingContext2d, (f64, f64)) -> MapViewResult<()> =
    |context, (width, height)| {
        context.clear_rect(0.0, 0.0, width, height);
        Ok(())
    };

pub const draw_background: fn(&CanvasRenderingContext2d, (f64, f64), &str) -> MapViewResult<()> =
    |context, (width, height), color| {
        context.set_fill_style_str(color);
        context.fill_rect(0.0, 0.0, width, height);
        Ok(())
    };

pub const apply_style: fn(&CanvasRenderingContext2d, &Style) =
    |context, style| {
        if let Some(fill) = &style.fill {
            context.set_fill_style_str(fill);
        }
        context.set_stroke_style_str(&style.stroke);
        context.set_line_width(style.stroke_width);
    };

// Outlines of the base tiles in view
pub const draw_tile_grid: fn(&CanvasRenderingContext2d, &Camera, u8) -> MapViewResult<()> =
    |context, camera, z| {
        context.set_stroke_style_str("#cccccc");
        context.set_line_width(0.5);
        TileId::covering(&camera.visible_extent(), z)
            .iter()
            .try_for_each(|tile| {
                trace_extent(context, camera, &tile.extent());
                context.stroke();
                Ok(())
            })
    };

pub const draw_extent: fn(&CanvasRenderingContext2d, &Camera, &Extent, &Style) -> MapViewResult<()> =
    |context, camera, extent, style| {
        apply_style(context, style);
        trace_extent(context, camera, extent);
        if style.fill.is_some() {
            context.fill();
        }
        context.stroke();
        Ok(())
    };

const trace_extent: fn(&CanvasRenderingContext2d, &Camera, &Extent) =
    |context, camera, extent| {
        let a = camera.render_to_pixel(extent.lower_left());
        let b = camera.render_to_pixel(extent.upper_right());
        context.begin_path();
        context.rect(a.x.min(b.x), a.y.min(b.y), (b.x - a.x).abs(), (b.y - a.y).abs());
    };

const trace_path: fn(&CanvasRenderingContext2d, &Camera, &LineString<f64>) =
    |context, camera, line| {
        let mut pixels = line.coords().map(|c: &Coord<f64>| camera.render_to_pixel((*c).into()));
        if let Some(first) = pixels.next() {
            context.move_to(first.x, first.y);
            pixels.for_each(|p| context.line_to(p.x, p.y));
        }
    };

pub const draw_point: fn(&CanvasRenderingContext2d, &Camera, Coord<f64>, &Style) -> MapViewResult<()> =
    |context, camera, coord, style| {
        let pixel = camera.render_to_pixel(coord.into());
        apply_style(context, style);
        context.begin_path();
        context
            .arc(pixel.x, pixel.y, POINT_RADIUS, 0.0, 2.0 * std::f64::consts::PI)
            .map_err(|_| MapViewError::Wasm("Failed to draw arc".to_string()))?;
        if style.fill.is_some() {
            context.fill();
        }
        context.stroke();
        Ok(())
    };

pub const draw_linestring: fn(&CanvasRenderingContext2d, &Camera, &LineString<f64>, &Style) -> MapViewResult<()> =
    |context, camera, line, style| {
        if line.0.is_empty() {
            return Ok(());
        }
        apply_style(context, style);
        context.begin_path();
        trace_path(context, camera, line);
        context.stroke();
        Ok(())
    };

pub const draw_polygon: fn(&CanvasRenderingContext2d, &Camera, &Polygon<f64>, &Style) -> MapViewResult<()> =
    |context, camera, polygon, style| {
        if polygon.exterior().0.is_empty() {
            return Ok(());
        }
        apply_style(context, style);
        context.begin_path();
        std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .for_each(|ring| {
                trace_path(context, camera, ring);
                context.close_path();
            });
        if style.fill.is_some() {
            context.fill_with_canvas_winding_rule(web_sys::CanvasWindingRule::Evenodd);
        }
        context.stroke();
        Ok(())
    };

/// Draws any geometry, recursing into multi-geometries and collections.
pub fn draw_geometry(
    context: &CanvasRenderingContext2d,
    camera: &Camera,
    geometry: &Geometry<f64>,
    style: &Style,
) -> MapViewResult<()> {
    match geometry {
        Geometry::Point(point) => draw_point(context, camera, point.0, style),
        Geometry::MultiPoint(points) => points
            .iter()
            .try_for_each(|point| draw_point(context, camera, point.0, style)),
        Geometry::Line(line) => {
            draw_linestring(context, camera, &LineString::from(vec![line.start, line.end]), style)
        }
        Geometry::LineString(line) => draw_linestring(context, camera, line, style),
        Geometry::MultiLineString(lines) => lines
            .iter()
            .try_for_each(|line| draw_linestring(context, camera, line, style)),
        Geometry::Polygon(polygon) => draw_polygon(context, camera, polygon, style),
        Geometry::MultiPolygon(polygons) => polygons
            .iter()
            .try_for_each(|polygon| draw_polygon(context, camera, polygon, style)),
        Geometry::Rect(rect) => draw_polygon(context, camera, &rect.to_polygon(), style),
        Geometry::Triangle(triangle) => draw_polygon(context, camera, &triangle.to_polygon(), style),
        Geometry::GeometryCollection(collection) => collection
            .iter()
            .try_for_each(|geometry| draw_geometry(context, camera, geometry, style)),
    }
}
