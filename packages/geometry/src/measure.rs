//! Centroids and great-circle distances.

use geo::{Centroid as _, Distance as _, Haversine};

use crate::GeometryError;

/// Centroid of any geometry.
///
/// # Errors
///
/// Returns [`GeometryError::Empty`] for geometries without coordinates.
pub fn centroid(geometry: &geo::Geometry<f64>) -> Result<geo::Point<f64>, GeometryError> {
    geometry.centroid().ok_or(GeometryError::Empty {
        operation: "centroid",
    })
}

/// Haversine distance between two WGS84 points, in kilometres.
#[must_use]
pub fn distance_km(a: geo::Point<f64>, b: geo::Point<f64>) -> f64 {
    Haversine.distance(a, b) / 1000.0
}

/// Straight segment from `a` to `b`.
#[must_use]
pub fn line_between(a: geo::Point<f64>, b: geo::Point<f64>) -> geo::LineString<f64> {
    geo::LineString::from(vec![a.0, b.0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn one_degree_of_latitude() {
        let d = distance_km(geo::point!(x: 85.0, y: 27.0), geo::point!(x: 85.0, y: 28.0));
        assert!((d - 111.195).abs() < 0.01, "got {d}");
    }

    #[test]
    fn centroid_of_square() {
        let square: geo::Geometry<f64> = geo::polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 0.0, y: 2.0),
            (x: 0.0, y: 0.0),
        ]
        .into();

        let c = centroid(&square).unwrap();
        assert!((c.x() - 1.0).abs() < 1e-12);
        assert!((c.y() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn centroid_of_empty_collection_fails() {
        let empty: geo::Geometry<f64> = geo::Geometry::GeometryCollection(geo::GeometryCollection::<f64>::new_from(vec![]));
        assert!(centroid(&empty).is_err());
    }

    #[test]
    fn segment_endpoints() {
        let line = line_between(geo::point!(x: 1.0, y: 2.0), geo::point!(x: 3.0, y: 4.0));
        assert_eq!(line.0.len(), 2);
        assert!((line.0[1].x - 3.0).abs() < f64::EPSILON);
    }
}
