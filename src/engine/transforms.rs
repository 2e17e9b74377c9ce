#![allow(non_upper_case_globals)]

use crate::error::{MapViewError, MapViewResult};
use crate::model::{Extent, GeoPoint, RenderPoint};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

// Pure transformation functions between the geographic projection
// (lon/lat degrees) and the spherical-mercator render projection (meters).

pub const EARTH_RADIUS: f64 = 6_378_137.0;

// Beyond this latitude mercator y grows without bound
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

// Half the width of the projected world
pub const HALF_WORLD: f64 = PI * EARTH_RADIUS;

/// Projects lon/lat degrees to spherical mercator.
///
/// Points outside [-180, 180] x [-90, 90] are rejected. Latitudes beyond
/// [`MAX_LATITUDE`] are valid input but land on the edge of the square
/// world, so only points inside the mercator band survive a round trip.
pub const to_render: fn(GeoPoint) -> MapViewResult<RenderPoint> = |point| {
    if !point.is_finite() || !point.is_valid() {
        return Err(MapViewError::invalid_coordinate(point.lon, point.lat));
    }
    let lat = point.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = EARTH_RADIUS * point.lon.to_radians();
    let y = EARTH_RADIUS * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    Ok(RenderPoint::new(x, y))
};

pub const to_geographic: fn(RenderPoint) -> MapViewResult<GeoPoint> = |point| {
    if !point.x.is_finite() || !point.y.is_finite() {
        return Err(MapViewError::invalid_coordinate(point.x, point.y));
    }
    let lon = (point.x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (point.y / EARTH_RADIUS).exp().atan() - FRAC_PI_2).to_degrees();
    Ok(GeoPoint::new(lon, lat))
};

// Resolution (render units per pixel) of a 256px-tile pyramid at `zoom`
pub const resolution_for_zoom: fn(f64) -> f64 =
    |zoom| 2.0 * HALF_WORLD / 256.0 / 2.0_f64.powf(zoom);

pub const zoom_for_resolution: fn(f64) -> f64 =
    |resolution| (2.0 * HALF_WORLD / 256.0 / resolution).log2();

// Smallest resolution at which `extent` fits in `viewport` after removing
// `padding` pixels from every side. None when the extent cannot be fitted.
pub const fit_resolution: fn(&Extent, (f64, f64), f64) -> Option<f64> =
    |extent, viewport, padding| {
        if extent.is_empty() || !extent.is_finite() {
            return None;
        }
        let (width, height) = viewport;
        let usable_width = if width - 2.0 * padding > 0.0 { width - 2.0 * padding } else { width };
        let usable_height = if height - 2.0 * padding > 0.0 { height - 2.0 * padding } else { height };
        if usable_width <= 0.0 || usable_height <= 0.0 {
            return None;
        }
        Some((extent.width() / usable_width).max(extent.height() / usable_height))
    };
