use crate::engine::geometry::{ProjectedFeature, VectorData};
use crate::engine::transforms::HALF_WORLD;
use crate::error::{MapViewError, MapViewResult};
use crate::model::{Extent, RenderPoint};
use std::collections::{HashMap, VecDeque};

pub const MAX_TILE_ZOOM: u8 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileId {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    pub fn new(z: u8, x: u32, y: u32) -> MapViewResult<Self> {
        if z > MAX_TILE_ZOOM {
            return Err(MapViewError::Serialization(format!(
                "Tile zoom {} exceeds {}",
                z, MAX_TILE_ZOOM
            )));
        }
        let max_coord = 1u64 << z;
        if x as u64 >= max_coord || y as u64 >= max_coord {
            return Err(MapViewError::Serialization(format!(
                "Tile {}/{}/{} is outside the grid",
                z, x, y
            )));
        }
        Ok(TileId { z, x, y })
    }

    fn span(z: u8) -> f64 {
        2.0 * HALF_WORLD / (1u64 << z) as f64
    }

    // XYZ scheme: row 0 is the northern edge
    pub fn extent(&self) -> Extent {
        let span = Self::span(self.z);
        let min_x = -HALF_WORLD + self.x as f64 * span;
        let max_y = HALF_WORLD - self.y as f64 * span;
        Extent::new(min_x, max_y - span, min_x + span, max_y)
    }

    /// Tiles at zoom `z` intersecting `extent`, row-major.
    pub fn covering(extent: &Extent, z: u8) -> Vec<TileId> {
        if extent.is_empty() || !extent.is_finite() || z > MAX_TILE_ZOOM {
            return Vec::new();
        }
        let span = Self::span(z);
        let last = ((1u64 << z) - 1) as f64;
        let column = |x: f64| ((x + HALF_WORLD) / span).floor().clamp(0.0, last) as u32;
        let row = |y: f64| ((HALF_WORLD - y) / span).floor().clamp(0.0, last) as u32;

        let mut tiles = Vec::new();
        for y in row(extent.max_y)..=row(extent.min_y) {
            for x in column(extent.min_x)..=column(extent.max_x) {
                tiles.push(TileId { z, x, y });
            }
        }
        tiles
    }
}

/// Decoded tile features of the mounted tiled overlay, kept for hit-testing.
/// The oldest tiles are evicted once `max_size` is exceeded.
#[derive(Debug)]
pub struct TileFeatureCache {
    tiles: HashMap<TileId, VectorData>,
    access_order: VecDeque<TileId>,
    max_size: usize,
}

impl TileFeatureCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            tiles: HashMap::new(),
            access_order: VecDeque::new(),
            max_size: max_size.max(1),
        }
    }

    pub fn insert(&mut self, id: TileId, data: VectorData) {
        if self.tiles.insert(id, data).is_some() {
            self.access_order.retain(|tile| *tile != id);
        }
        self.access_order.push_back(id);
        while self.tiles.len() > self.max_size {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.access_order.pop_front() {
            self.tiles.remove(&oldest);
            tracing::trace!("evicted tile {}/{}/{}", oldest.z, oldest.x, oldest.y);
        }
    }

    pub fn get(&self, id: &TileId) -> Option<&VectorData> {
        self.tiles.get(id)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
        self.access_order.clear();
    }

    /// Cached tiles of level `z` in draw order, oldest first. Tiles of
    /// other levels stay cached for when the camera returns to them.
    pub fn iter_level(&self, z: u8) -> impl Iterator<Item = (&TileId, &VectorData)> {
        self.access_order
            .iter()
            .filter(move |id| id.z == z)
            .filter_map(|id| self.tiles.get_key_value(id))
    }

    /// Features of level-`z` tiles under `point`, topmost first: later tiles
    /// draw above earlier ones and later features above earlier ones within
    /// a tile.
    pub fn features_at(&self, point: RenderPoint, tolerance: f64, z: u8) -> Vec<&ProjectedFeature> {
        self.access_order
            .iter()
            .rev()
            .filter(|id| id.z == z)
            .filter_map(|id| self.tiles.get(id))
            .flat_map(|data| data.features_at(point, tolerance))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeatureProperties;
    use geo::{Geometry, Point};

    fn point_data(x: f64, y: f64, name: &str) -> VectorData {
        let mut properties = FeatureProperties::new();
        properties.insert("name".to_string(), name.into());
        VectorData::from_projected(vec![ProjectedFeature {
            geometry: Geometry::Point(Point::new(x, y)),
            properties,
        }])
    }

    #[test]
    fn test_tile_id_bounds_check() {
        assert!(TileId::new(1, 1, 1).is_ok());
        assert!(TileId::new(1, 2, 0).is_err());
        assert!(TileId::new(31, 0, 0).is_err());
    }

    #[test]
    fn test_root_tile_covers_world() {
        let extent = TileId::new(0, 0, 0).unwrap().extent();
        assert_eq!(extent, Extent::new(-HALF_WORLD, -HALF_WORLD, HALF_WORLD, HALF_WORLD));
    }

    #[test]
    fn test_covering_north_east_quadrant() {
        let extent = Extent::new(1.0, 1.0, 2.0, 2.0);
        assert_eq!(TileId::covering(&extent, 1), vec![TileId { z: 1, x: 1, y: 0 }]);
        let world = TileId::new(0, 0, 0).unwrap().extent();
        assert_eq!(TileId::covering(&world, 1).len(), 4);
    }

    #[test]
    fn test_tile_cache_evicts_oldest() {
        let mut cache = TileFeatureCache::new(2);
        let a = TileId::new(1, 0, 0).unwrap();
        let b = TileId::new(1, 1, 0).unwrap();
        let c = TileId::new(1, 0, 1).unwrap();
        cache.insert(a, point_data(0.0, 0.0, "a"));
        cache.insert(b, point_data(0.0, 0.0, "b"));
        cache.insert(c, point_data(0.0, 0.0, "c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&a).is_none());
        assert!(cache.get(&c).is_some());
    }

    #[test]
    fn test_reinsert_refreshes_order() {
        let mut cache = TileFeatureCache::new(2);
        let a = TileId::new(1, 0, 0).unwrap();
        let b = TileId::new(1, 1, 0).unwrap();
        let c = TileId::new(1, 1, 1).unwrap();
        cache.insert(a, point_data(0.0, 0.0, "a"));
        cache.insert(b, point_data(0.0, 0.0, "b"));
        cache.insert(a, point_data(0.0, 0.0, "a2"));
        cache.insert(c, point_data(0.0, 0.0, "c"));
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&b).is_none());
    }

    #[test]
    fn test_latest_tile_is_topmost() {
        let mut cache = TileFeatureCache::new(8);
        cache.insert(TileId::new(1, 0, 0).unwrap(), point_data(10.0, 10.0, "first"));
        cache.insert(TileId::new(1, 1, 0).unwrap(), point_data(10.0, 10.0, "second"));
        let hits = cache.features_at(RenderPoint::new(10.5, 10.0), 1.0, 1);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].properties["name"], "second");
        assert!(cache.features_at(RenderPoint::new(50.0, 50.0), 1.0, 1).is_empty());
    }

    #[test]
    fn test_only_requested_level_is_visible() {
        let mut cache = TileFeatureCache::new(8);
        cache.insert(TileId::new(1, 0, 0).unwrap(), point_data(10.0, 10.0, "coarse"));
        cache.insert(TileId::new(2, 1, 1).unwrap(), point_data(10.0, 10.0, "fine"));

        let hits = cache.features_at(RenderPoint::new(10.0, 10.0), 1.0, 2);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].properties["name"], "fine");
        assert!(cache.features_at(RenderPoint::new(10.0, 10.0), 1.0, 3).is_empty());

        let drawn: Vec<_> = cache.iter_level(1).map(|(id, _)| *id).collect();
        assert_eq!(drawn, vec![TileId { z: 1, x: 0, y: 0 }]);
        assert_eq!(cache.len(), 2);
    }
}
