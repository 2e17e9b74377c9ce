use crate::engine::transforms::to_render;
use crate::error::{MapViewError, MapViewResult};
use crate::model::{Extent, FeatureProperties, GeoPoint, RenderPoint};
use geo::{BoundingRect, Coord, Geometry, Intersects, MapCoords, Rect};
use geojson::FeatureCollection;

// A feature already projected into the render projection
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectedFeature {
    pub geometry: Geometry<f64>,
    pub properties: FeatureProperties,
}

impl ProjectedFeature {
    pub fn extent(&self) -> Option<Extent> {
        self.geometry.bounding_rect().map(Extent::from)
    }

    /// True when the geometry touches the square of half-width `tolerance`
    /// centered on `point`.
    pub fn hit(&self, point: RenderPoint, tolerance: f64) -> bool {
        self.geometry.intersects(&pick_rect(point, tolerance))
    }
}

/// Contents of a data-overlay layer: projected once at creation, never mutated.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct VectorData {
    features: Vec<ProjectedFeature>,
    extent: Option<Extent>,
}

impl VectorData {
    pub fn from_projected(features: Vec<ProjectedFeature>) -> Self {
        let extent = features
            .iter()
            .filter_map(ProjectedFeature::extent)
            .reduce(|a, b| a.merge(&b));
        VectorData { features, extent }
    }

    /// Projects a geographic feature collection. Features without geometry
    /// carry nothing to draw and are skipped.
    pub fn from_geojson(collection: &FeatureCollection) -> MapViewResult<Self> {
        let mut features = Vec::with_capacity(collection.features.len());
        for feature in &collection.features {
            let Some(geometry) = &feature.geometry else {
                tracing::debug!("skipping feature without geometry");
                continue;
            };
            features.push(ProjectedFeature {
                geometry: project_geometry(geometry)?,
                properties: feature.properties.clone().unwrap_or_default(),
            });
        }
        Ok(VectorData::from_projected(features))
    }

    pub fn features(&self) -> &[ProjectedFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Bounding extent of every feature, `None` when there is nothing to bound.
    pub fn extent(&self) -> Option<Extent> {
        self.extent
    }

    /// Features under `point`, topmost (last drawn) first.
    pub fn features_at(&self, point: RenderPoint, tolerance: f64) -> Vec<&ProjectedFeature> {
        self.features
            .iter()
            .rev()
            .filter(|feature| feature.hit(point, tolerance))
            .collect()
    }
}

// Convert a GeoJSON geometry (lon/lat) into a render-projection geometry
pub fn project_geometry(geometry: &geojson::Geometry) -> MapViewResult<Geometry<f64>> {
    let geographic = Geometry::<f64>::try_from(geometry.value.clone())
        .map_err(|e| MapViewError::InvalidGeometry(e.to_string()))?;
    geographic.try_map_coords(|coord: Coord<f64>| {
        to_render(GeoPoint::new(coord.x, coord.y)).map(Coord::from)
    })
}

pub fn pick_rect(point: RenderPoint, tolerance: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: point.x - tolerance,
            y: point.y - tolerance,
        },
        Coord {
            x: point.x + tolerance,
            y: point.y + tolerance,
        },
    )
}
