use crate::error::{MapViewError, MapViewResult};
use crate::model::GeoPoint;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Tunables for a [`MapView`](crate::view::view::MapView).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use landuse_map::config::MapConfig;
///
/// let config = MapConfig::from_json(r#"{ "initial_zoom": 9 }"#).unwrap();
/// assert_eq!(config.initial_zoom, 9.0);
/// assert_eq!(config.fit_padding_px, 24.0);
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// `[lon, lat]` of the initial view center.
    pub initial_center: [f64; 2],
    pub initial_zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub fit_padding_px: f64,
    pub fit_duration_ms: u64,
    pub popup_autopan_ms: u64,
    pub hit_tolerance_px: f64,
    pub base_tile_url: String,
    pub max_cached_tiles: usize,
    pub log_level: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            initial_center: [10.21, 51.14],
            initial_zoom: 6.0,
            min_zoom: 0.0,
            max_zoom: 28.0,
            fit_padding_px: 24.0,
            fit_duration_ms: 400,
            popup_autopan_ms: 250,
            hit_tolerance_px: 3.0,
            base_tile_url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            max_cached_tiles: 512,
            log_level: "info".to_string(),
        }
    }
}

impl MapConfig {
    pub fn from_json(content: &str) -> MapViewResult<Self> {
        let config: MapConfig = serde_json::from_str(content)
            .map_err(|e| MapViewError::Config(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MapViewResult<()> {
        let [lon, lat] = self.initial_center;
        let center = GeoPoint::new(lon, lat);
        if !center.is_finite() || !center.is_valid() {
            return Err(MapViewError::Config(format!(
                "initial_center out of range: [{}, {}]",
                lon, lat
            )));
        }
        if !(0.0..=30.0).contains(&self.min_zoom) || !(0.0..=30.0).contains(&self.max_zoom) {
            return Err(MapViewError::Config(
                "zoom levels must be between 0 and 30".to_string(),
            ));
        }
        if self.min_zoom > self.max_zoom {
            return Err(MapViewError::Config(
                "min_zoom cannot be greater than max_zoom".to_string(),
            ));
        }
        if !(self.min_zoom..=self.max_zoom).contains(&self.initial_zoom) {
            return Err(MapViewError::Config(
                "initial_zoom must lie within [min_zoom, max_zoom]".to_string(),
            ));
        }
        if !(self.fit_padding_px >= 0.0) {
            return Err(MapViewError::Config(
                "fit_padding_px cannot be negative".to_string(),
            ));
        }
        if !(self.hit_tolerance_px > 0.0) {
            return Err(MapViewError::Config(
                "hit_tolerance_px must be positive".to_string(),
            ));
        }
        if self.max_cached_tiles == 0 {
            return Err(MapViewError::Config(
                "max_cached_tiles must be greater than 0".to_string(),
            ));
        }
        self.level()?;
        Ok(())
    }

    pub fn level(&self) -> MapViewResult<tracing::Level> {
        tracing::Level::from_str(&self.log_level)
            .map_err(|_| MapViewError::Config(format!("unknown log level: {}", self.log_level)))
    }

    pub fn fit_duration(&self) -> Duration {
        Duration::from_millis(self.fit_duration_ms)
    }

    pub fn popup_autopan(&self) -> Duration {
        Duration::from_millis(self.popup_autopan_ms)
    }
}

/// Installs the fmt subscriber once; later calls are ignored.
pub fn init_tracing(config: &MapConfig) {
    let level = config.level().unwrap_or(tracing::Level::INFO);
    // No system clock on wasm32-unknown-unknown
    if tracing_subscriber::fmt()
        .with_max_level(level)
        .without_time()
        .try_init()
        .is_ok()
    {
        tracing::debug!("tracing initialized at {}", level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MapConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fit_duration(), Duration::from_millis(400));
        assert_eq!(config.popup_autopan(), Duration::from_millis(250));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = MapConfig::from_json(r#"{ "max_cached_tiles": 16, "log_level": "debug" }"#)
            .unwrap();
        assert_eq!(config.max_cached_tiles, 16);
        assert_eq!(config.level().unwrap(), tracing::Level::DEBUG);
        assert_eq!(config.initial_center, [10.21, 51.14]);
    }

    #[test]
    fn rejects_inverted_zoom_range() {
        let err = MapConfig::from_json(r#"{ "min_zoom": 12, "max_zoom": 4, "initial_zoom": 6 }"#)
            .unwrap_err();
        assert!(matches!(err, MapViewError::Config(_)));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let config = MapConfig {
            log_level: "loud".to_string(),
            ..MapConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_center_outside_lon_lat_range() {
        let err = MapConfig::from_json(r#"{ "initial_center": [10.0, 91.0] }"#).unwrap_err();
        assert!(matches!(err, MapViewError::Config(_)));
        assert!(MapConfig::from_json(r#"{ "initial_center": [10.0, 88.0] }"#).is_ok());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(MapConfig::from_json("{ not json").is_err());
    }
}
