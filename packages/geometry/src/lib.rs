#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry engine for the impact map.
//!
//! Stateless functions over WGS84 longitude/latitude geometries, built on
//! the `geo` crate:
//!
//! - [`buffer`](buffer::buffer) with a radius in kilometres, computed in a
//!   local equirectangular plane centred on the input,
//! - boolean [`intersects`](overlay::intersects), exact
//!   [`intersection`](overlay::intersection) and pairwise
//!   [`union`](overlay::union),
//! - strict [`is_within`](overlay::is_within) containment,
//! - [`centroid`](measure::centroid) and great-circle
//!   [`distance_km`](measure::distance_km).
//!
//! Every operation that can fail on a degenerate input returns a
//! [`GeometryError`] rather than panicking, so callers iterating a
//! collection can skip the offending item.

pub mod buffer;
pub mod measure;
pub mod overlay;

pub use buffer::{buffer, buffer_features};
pub use measure::{centroid, distance_km, line_between};
pub use overlay::{intersection, intersects, is_within, union};

use geo::BoundingRect as _;
use impact_map_layer_models::{Feature, GeometryFamily};
use thiserror::Error;

/// Errors produced by geometry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// The operation produced, or was given, an empty geometry.
    #[error("Empty geometry: {operation} produced no output")]
    Empty {
        /// Operation name.
        operation: &'static str,
    },

    /// The operation is not defined for this geometry family.
    #[error("Unsupported geometry: {operation} is not defined for {family} geometries")]
    Unsupported {
        /// Operation name.
        operation: &'static str,
        /// Offending family.
        family: GeometryFamily,
    },

    /// Buffer distance was zero, negative, or not finite.
    #[error("Invalid distance: {value} km")]
    InvalidDistance {
        /// Rejected value, formatted.
        value: String,
    },
}

/// Bounding rectangle covering every feature, or `None` if there are no
/// features with extent.
#[must_use]
pub fn bounds<'a>(features: impl IntoIterator<Item = &'a Feature>) -> Option<geo::Rect<f64>> {
    features
        .into_iter()
        .filter_map(|f| f.geometry.bounding_rect())
        .reduce(|acc, rect| {
            geo::Rect::new(
                geo::coord! {
                    x: acc.min().x.min(rect.min().x),
                    y: acc.min().y.min(rect.min().y),
                },
                geo::coord! {
                    x: acc.max().x.max(rect.max().x),
                    y: acc.max().y.max(rect.max().y),
                },
            )
        })
}

/// Widens a polygonal geometry to a [`geo::MultiPolygon`], or `None` for
/// non-area families.
pub(crate) fn as_multi_polygon(geometry: &geo::Geometry<f64>) -> Option<geo::MultiPolygon<f64>> {
    match geometry {
        geo::Geometry::Polygon(p) => Some(geo::MultiPolygon(vec![p.clone()])),
        geo::Geometry::MultiPolygon(mp) => Some(mp.clone()),
        geo::Geometry::Rect(r) => Some(geo::MultiPolygon(vec![r.to_polygon()])),
        geo::Geometry::Triangle(t) => Some(geo::MultiPolygon(vec![t.to_polygon()])),
        _ => None,
    }
}
