//! In-memory data provider and fixtures for session tests.

use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;
use geo::{line_string, polygon};
use impact_map_layer_models::{DataSource, Feature, FeatureCollection};
use impact_map_provider::{DataProvider, ProviderError};

/// Kilometres per degree of latitude on the mean-radius sphere.
pub const KM_PER_DEGREE: f64 = std::f64::consts::PI * 6371.0088 / 180.0;

/// Marked location used by proximity fixtures.
pub const ORIGIN: (f64, f64) = (85.54, 27.62);

pub struct StaticProvider {
    collections: BTreeMap<DataSource, Vec<Feature>>,
    failing: Option<DataSource>,
    requests: Mutex<Vec<DataSource>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self {
            collections: BTreeMap::new(),
            failing: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, source: DataSource, features: Vec<Feature>) -> Self {
        self.collections.insert(source, features);
        self
    }

    pub fn failing(mut self, source: DataSource) -> Self {
        self.failing = Some(source);
        self
    }

    pub fn requests(&self) -> Vec<DataSource> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataProvider for StaticProvider {
    async fn fetch(&self, source: DataSource) -> Result<FeatureCollection, ProviderError> {
        self.requests.lock().unwrap().push(source);
        if self.failing == Some(source) {
            return Err(ProviderError::Status {
                layer: source,
                status: "500 Internal Server Error".to_string(),
            });
        }
        Ok(FeatureCollection::new(
            source,
            self.collections.get(&source).cloned().unwrap_or_default(),
        ))
    }
}

/// Axis-aligned square with its lower-left corner at (`x`, `y`).
pub fn square(x: f64, y: f64, size: f64) -> Feature {
    Feature::new(geo::polygon![
        (x: x, y: y),
        (x: x + size, y: y),
        (x: x + size, y: y + size),
        (x: x, y: y + size),
        (x: x, y: y),
    ])
}

/// 0.01° squares along a row, 0.02° apart per unit of offset.
pub fn squares(source: DataSource, offsets: &[f64]) -> FeatureCollection {
    FeatureCollection::new(
        source,
        offsets
            .iter()
            .map(|offset| square(0.02f64.mul_add(*offset, 85.5), 27.6, 0.01))
            .collect(),
    )
}

pub fn point(x: f64, y: f64) -> Feature {
    Feature::new(geo::point!(x: x, y: y))
}

/// Roads with one east-west road through the origin, buildings and
/// hospitals on either side of it.
pub fn corridor_provider() -> StaticProvider {
    StaticProvider::new()
        .with(
            DataSource::Roads,
            vec![
                Feature::new(geo::line_string![(x: 85.53, y: 27.62), (x: 85.55, y: 27.62)])
                    .with_property("id", 7),
                // Dropped by the line allow-list.
                point(85.53, 27.62),
            ],
        )
        .with(
            DataSource::Buildings,
            vec![
                point(85.54, 27.621).with_property("id", "near"),
                point(85.54, 27.64).with_property("id", "far"),
                square(85.545, 27.6202, 0.001).with_property("id", "footprint"),
            ],
        )
        .with(
            DataSource::Hospitals,
            vec![
                point(85.545, 27.619)
                    .with_property("id", 1)
                    .with_property("name", "Dhulikhel Hospital"),
                point(85.50, 27.70).with_property("id", 2),
            ],
        )
}

/// Hospitals due north of [`ORIGIN`] at 5, 1 and 3 km, and buildings
/// including one polygon footprint.
pub fn proximity_provider() -> StaticProvider {
    let north = |km: f64| point(ORIGIN.0, ORIGIN.1 + km / KM_PER_DEGREE);

    StaticProvider::new()
        .with(
            DataSource::Buildings,
            vec![
                point(85.541, 27.621),
                square(85.542, 27.622, 0.001),
                point(85.543, 27.623),
            ],
        )
        .with(
            DataSource::Hospitals,
            vec![
                north(5.0).with_property("id", "h5").with_property("name", "Far"),
                north(1.0)
                    .with_property("id", "h1")
                    .with_property("name", "Near")
                    .with_property("type", "General"),
                north(3.0).with_property("id", "h3").with_property("name", "Middle"),
            ],
        )
}

/// Two hospitals at the same spot 1 km north of [`ORIGIN`], loaded in
/// the order `first`, `second`.
pub fn tied_hospitals_provider() -> StaticProvider {
    let at = point(ORIGIN.0, ORIGIN.1 + 1.0 / KM_PER_DEGREE);

    StaticProvider::new()
        .with(DataSource::Buildings, vec![point(85.541, 27.621)])
        .with(
            DataSource::Hospitals,
            vec![
                at.clone().with_property("id", "first"),
                at.with_property("id", "second"),
            ],
        )
}

/// An empty local-level layer, one district and one province.
pub fn boundary_provider() -> StaticProvider {
    StaticProvider::new()
        .with(DataSource::Local, Vec::new())
        .with(
            DataSource::District,
            vec![square(85.5, 27.6, 0.1).with_property("name", "Kavrepalanchok")],
        )
        .with(
            DataSource::Province,
            vec![square(85.0, 27.0, 1.0).with_property("name", "Bagmati")],
        )
}
