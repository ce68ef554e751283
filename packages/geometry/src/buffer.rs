//! Kilometre buffers around WGS84 geometries.
//!
//! Coordinates are projected into a local equirectangular plane measured in
//! kilometres, buffered there, and projected back. The distortion is
//! negligible at municipality scale.

use geo::{Buffer as _, BoundingRect as _, MapCoords as _};
use impact_map_layer_models::{Feature, FeatureCollection};

use crate::GeometryError;

/// Mean earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Local equirectangular projection anchored at a reference coordinate.
#[derive(Debug, Clone, Copy)]
struct LocalPlane {
    origin: geo::Coord<f64>,
    cos_lat: f64,
}

impl LocalPlane {
    fn centred_on(geometry: &geo::Geometry<f64>) -> Option<Self> {
        let rect = geometry.bounding_rect()?;
        let origin = rect.center();
        Some(Self {
            origin,
            cos_lat: origin.y.to_radians().cos(),
        })
    }

    fn forward(&self, c: geo::Coord<f64>) -> geo::Coord<f64> {
        geo::coord! {
            x: EARTH_RADIUS_KM * (c.x - self.origin.x).to_radians() * self.cos_lat,
            y: EARTH_RADIUS_KM * (c.y - self.origin.y).to_radians(),
        }
    }

    fn inverse(&self, c: geo::Coord<f64>) -> geo::Coord<f64> {
        geo::coord! {
            x: self.origin.x + (c.x / (EARTH_RADIUS_KM * self.cos_lat)).to_degrees(),
            y: self.origin.y + (c.y / EARTH_RADIUS_KM).to_degrees(),
        }
    }
}

/// Buffers a geometry by `km` kilometres.
///
/// # Errors
///
/// Returns [`GeometryError::InvalidDistance`] for a non-positive or
/// non-finite radius and [`GeometryError::Empty`] when the input has no
/// extent or the buffer comes out empty.
pub fn buffer(geometry: &geo::Geometry<f64>, km: f64) -> Result<geo::MultiPolygon<f64>, GeometryError> {
    if !km.is_finite() || km <= 0.0 {
        return Err(GeometryError::InvalidDistance {
            value: km.to_string(),
        });
    }

    let plane = LocalPlane::centred_on(geometry).ok_or(GeometryError::Empty {
        operation: "buffer",
    })?;

    let projected = geometry.map_coords(|c| plane.forward(c));
    let buffered = projected.buffer(km);

    if buffered.0.is_empty() {
        return Err(GeometryError::Empty {
            operation: "buffer",
        });
    }

    Ok(buffered.map_coords(|c| plane.inverse(c)))
}

/// Buffers every feature of a collection, keeping each feature's
/// properties on its buffer.
///
/// # Errors
///
/// Fails on the first feature that cannot be buffered; the collection is
/// processed as a single input.
pub fn buffer_features(collection: &FeatureCollection, km: f64) -> Result<Vec<Feature>, GeometryError> {
    collection
        .features()
        .iter()
        .map(|feature| {
            let polygon = buffer(&feature.geometry, km)?;
            Ok(Feature {
                geometry: geo::Geometry::MultiPolygon(polygon),
                properties: feature.properties.clone(),
            })
        })
        .collect()
}
