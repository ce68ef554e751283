//! Boolean predicates and overlay operations.

use geo::{BooleanOps as _, Intersects as _, Relate as _};
use impact_map_layer_models::GeometryFamily;

use crate::{GeometryError, as_multi_polygon};

/// Whether two geometries share at least one point.
#[must_use]
pub fn intersects(a: &geo::Geometry<f64>, b: &geo::Geometry<f64>) -> bool {
    a.intersects(b)
}

/// Strict containment: `inner` lies in `outer` and touches its interior.
/// A point on the boundary is not within.
#[must_use]
pub fn is_within(inner: &geo::Geometry<f64>, outer: &geo::Geometry<f64>) -> bool {
    inner.relate(outer).is_within()
}

/// Exact intersection of two geometries.
///
/// Area/area yields polygons, line/area yields the clipped lines, and
/// point/any yields the points that touch the other geometry. Returns
/// `Ok(None)` when the result is empty.
///
/// # Errors
///
/// Returns [`GeometryError::Unsupported`] for line/line and collection
/// inputs.
pub fn intersection(
    a: &geo::Geometry<f64>,
    b: &geo::Geometry<f64>,
) -> Result<Option<geo::Geometry<f64>>, GeometryError> {
    let family_a = GeometryFamily::of(a);
    let family_b = GeometryFamily::of(b);

    match (family_a, family_b) {
        (GeometryFamily::Area, GeometryFamily::Area) => {
            let (Some(a), Some(b)) = (as_multi_polygon(a), as_multi_polygon(b)) else {
                return Err(unsupported("intersection", family_a));
            };
            let result = a.intersection(&b);
            Ok((!result.0.is_empty()).then_some(geo::Geometry::MultiPolygon(result)))
        }
        (GeometryFamily::Line, GeometryFamily::Area) => Ok(clip_lines(a, b)),
        (GeometryFamily::Area, GeometryFamily::Line) => Ok(clip_lines(b, a)),
        (GeometryFamily::Point, _) => Ok(touching_points(a, b)),
        (_, GeometryFamily::Point) => Ok(touching_points(b, a)),
        (GeometryFamily::Collection, _) => Err(unsupported("intersection", family_a)),
        (_, other) => Err(unsupported("intersection", other)),
    }
}

/// Union of two area geometries. Returns `Ok(None)` if the union is empty.
///
/// # Errors
///
/// Returns [`GeometryError::Unsupported`] if either input is not an area.
pub fn union(
    a: &geo::Geometry<f64>,
    b: &geo::Geometry<f64>,
) -> Result<Option<geo::Geometry<f64>>, GeometryError> {
    let a = as_multi_polygon(a).ok_or_else(|| unsupported("union", GeometryFamily::of(a)))?;
    let b = as_multi_polygon(b).ok_or_else(|| unsupported("union", GeometryFamily::of(b)))?;

    let result = a.union(&b);
    Ok((!result.0.is_empty()).then_some(geo::Geometry::MultiPolygon(result)))
}

const fn unsupported(operation: &'static str, family: GeometryFamily) -> GeometryError {
    GeometryError::Unsupported { operation, family }
}

fn clip_lines(lines: &geo::Geometry<f64>, area: &geo::Geometry<f64>) -> Option<geo::Geometry<f64>> {
    let lines = match lines {
        geo::Geometry::Line(l) => geo::MultiLineString(vec![geo::LineString::from(*l)]),
        geo::Geometry::LineString(ls) => geo::MultiLineString(vec![ls.clone()]),
        geo::Geometry::MultiLineString(mls) => mls.clone(),
        _ => return None,
    };
    let area = as_multi_polygon(area)?;

    let clipped = area.clip(&lines, false);
    (!clipped.0.is_empty()).then_some(geo::Geometry::MultiLineString(clipped))
}

fn touching_points(points: &geo::Geometry<f64>, other: &geo::Geometry<f64>) -> Option<geo::Geometry<f64>> {
    let candidates: Vec<geo::Point<f64>> = match points {
        geo::Geometry::Point(p) => vec![*p],
        geo::Geometry::MultiPoint(mp) => mp.0.clone(),
        _ => return None,
    };

    let hits: Vec<geo::Point<f64>> = candidates
        .into_iter()
        .filter(|p| p.intersects(other))
        .collect();

    match hits.len() {
        0 => None,
        1 => Some(geo::Geometry::Point(hits[0])),
        _ => Some(geo::Geometry::MultiPoint(geo::MultiPoint(hits))),
    }
}
