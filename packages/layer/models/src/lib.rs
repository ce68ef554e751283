#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature collection, data source, and tool context types.
//!
//! These are the plain data types shared by the provider client, the
//! geometry engine wrappers, and the analysis session. A
//! [`FeatureCollection`] is tagged with the [`DataSource`] it came from and
//! is never mutated after it has been loaded; filtering produces a new
//! collection.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Coarse classification of a geometry type.
///
/// Decides which containment test applies to a feature and which features
/// a data source accepts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GeometryFamily {
    /// `Point` and `MultiPoint`.
    Point,
    /// `Line`, `LineString` and `MultiLineString`.
    Line,
    /// `Polygon`, `MultiPolygon`, `Rect` and `Triangle`.
    Area,
    /// `GeometryCollection`.
    Collection,
}

impl GeometryFamily {
    /// Classifies a geometry.
    #[must_use]
    pub const fn of(geometry: &geo::Geometry<f64>) -> Self {
        match geometry {
            geo::Geometry::Point(_) | geo::Geometry::MultiPoint(_) => Self::Point,
            geo::Geometry::Line(_)
            | geo::Geometry::LineString(_)
            | geo::Geometry::MultiLineString(_) => Self::Line,
            geo::Geometry::Polygon(_)
            | geo::Geometry::MultiPolygon(_)
            | geo::Geometry::Rect(_)
            | geo::Geometry::Triangle(_) => Self::Area,
            geo::Geometry::GeometryCollection(_) => Self::Collection,
        }
    }
}

/// Where a feature collection came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataSource {
    /// Local-level administrative boundaries.
    Local,
    /// District boundaries.
    District,
    /// Province boundaries.
    Province,
    /// Road centrelines.
    Roads,
    /// Building footprints or points.
    Buildings,
    /// Hospital locations.
    Hospitals,
    /// User-uploaded shapefile in slot A.
    ShapefileA,
    /// User-uploaded shapefile in slot B.
    ShapefileB,
}

impl DataSource {
    /// The three administrative boundary overlays, in load order.
    pub const BOUNDARIES: [Self; 3] = [Self::Local, Self::District, Self::Province];

    /// Human-readable label used for popups and notices.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Local => "Local Level",
            Self::District => "District",
            Self::Province => "Province",
            Self::Roads => "Road",
            Self::Buildings => "Building",
            Self::Hospitals => "Hospital",
            Self::ShapefileA => "Shapefile A",
            Self::ShapefileB => "Shapefile B",
        }
    }

    /// Geometry families accepted when this source is loaded. `None` accepts
    /// any family as long as a geometry is present.
    #[must_use]
    pub const fn allowed_families(self) -> Option<&'static [GeometryFamily]> {
        match self {
            Self::Local | Self::District | Self::Province => Some(&[GeometryFamily::Area]),
            Self::Roads => Some(&[GeometryFamily::Line]),
            Self::Buildings | Self::Hospitals | Self::ShapefileA | Self::ShapefileB => None,
        }
    }

    /// Whether this is one of the administrative boundary overlays.
    #[must_use]
    pub const fn is_boundary(self) -> bool {
        matches!(self, Self::Local | Self::District | Self::Province)
    }

    /// Sources served by the data provider's HTTP API.
    pub fn remote() -> impl Iterator<Item = Self> {
        Self::iter().filter(|source| !matches!(source, Self::ShapefileA | Self::ShapefileB))
    }
}

/// One of the two user upload slots.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Slot {
    /// First operand of buffer / intersect / union.
    A,
    /// Second operand of intersect / union.
    B,
}

impl Slot {
    /// The data source tag given to collections loaded into this slot.
    #[must_use]
    pub const fn source(self) -> DataSource {
        match self {
            Self::A => DataSource::ShapefileA,
            Self::B => DataSource::ShapefileB,
        }
    }
}

/// A geometry plus its attribute record.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Geometry in WGS84 longitude/latitude.
    pub geometry: geo::Geometry<f64>,
    /// `GeoJSON` properties object.
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl Feature {
    /// Creates a feature with no properties.
    #[must_use]
    pub fn new(geometry: impl Into<geo::Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            properties: serde_json::Map::new(),
        }
    }

    /// Adds a property, builder style.
    #[must_use]
    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Geometry family of this feature.
    #[must_use]
    pub const fn family(&self) -> GeometryFamily {
        GeometryFamily::of(&self.geometry)
    }

    /// Returns a property rendered as text. Numbers and booleans are
    /// stringified; null, empty strings, arrays and objects yield `None`.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// The `id` property, or `"Unknown"`.
    #[must_use]
    pub fn id_label(&self) -> String {
        self.property("id").unwrap_or_else(|| "Unknown".to_string())
    }

    /// Converts a parsed `GeoJSON` feature.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureConversionError`] if the feature has no geometry or
    /// the geometry cannot be represented as a `geo` geometry.
    pub fn from_geojson(feature: geojson::Feature) -> Result<Self, FeatureConversionError> {
        let geometry = feature.geometry.ok_or(FeatureConversionError::MissingGeometry)?;
        let geometry = geo::Geometry::<f64>::try_from(geometry).map_err(|e| {
            FeatureConversionError::Geometry {
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            geometry,
            properties: feature.properties.unwrap_or_default(),
        })
    }

    /// Converts back into a `GeoJSON` feature.
    #[must_use]
    pub fn to_geojson(&self) -> geojson::Feature {
        geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&self.geometry))),
            id: None,
            properties: Some(self.properties.clone()),
            foreign_members: None,
        }
    }
}

/// Why a `GeoJSON` feature could not become a [`Feature`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureConversionError {
    /// `geometry` was null or absent.
    MissingGeometry,
    /// The geometry was present but not convertible.
    Geometry {
        /// Conversion error text.
        message: String,
    },
}

impl std::fmt::Display for FeatureConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingGeometry => write!(f, "feature has no geometry"),
            Self::Geometry { message } => write!(f, "invalid geometry: {message}"),
        }
    }
}

impl std::error::Error for FeatureConversionError {}

/// An immutable set of features from a single source.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    source: DataSource,
    features: Vec<Feature>,
}

impl FeatureCollection {
    /// Creates a collection.
    #[must_use]
    pub const fn new(source: DataSource, features: Vec<Feature>) -> Self {
        Self { source, features }
    }

    /// The source tag.
    #[must_use]
    pub const fn source(&self) -> DataSource {
        self.source
    }

    /// The member features, in load order.
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Number of features.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection has no features.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Returns a new collection keeping only features of the given families,
    /// plus the number of features that were dropped.
    #[must_use]
    pub fn retain_families(self, families: &[GeometryFamily]) -> (Self, usize) {
        let before = self.features.len();
        let features: Vec<Feature> = self
            .features
            .into_iter()
            .filter(|f| families.contains(&f.family()))
            .collect();
        let dropped = before - features.len();

        (
            Self {
                source: self.source,
                features,
            },
            dropped,
        )
    }

    /// Re-tags the collection with another source.
    #[must_use]
    pub fn with_source(self, source: DataSource) -> Self {
        Self {
            source,
            features: self.features,
        }
    }

    /// Converts into a `GeoJSON` feature collection.
    #[must_use]
    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self.features.iter().map(Feature::to_geojson).collect(),
            foreign_members: None,
        }
    }
}

/// The analysis mode that governs which data is loaded and which transient
/// state exists.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ToolContext {
    /// Nothing active.
    #[default]
    None,
    /// Buffer slot A.
    Buffer,
    /// Pairwise intersection of slots A and B.
    Intersect,
    /// Pairwise union of slots A and B.
    Union,
    /// Road-corridor impact analysis.
    RoadBuffer,
    /// Nearest-hospital proximity search.
    Proximity,
}

impl ToolContext {
    /// Infrastructure sources fetched, in order, when this context is
    /// entered.
    #[must_use]
    pub const fn entry_sources(self) -> &'static [DataSource] {
        match self {
            Self::RoadBuffer => &[DataSource::Roads, DataSource::Buildings, DataSource::Hospitals],
            Self::Proximity => &[DataSource::Buildings, DataSource::Hospitals],
            Self::None | Self::Buffer | Self::Intersect | Self::Union => &[],
        }
    }
}

/// Top-level page section.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Section {
    /// Buffer / intersect / union over uploaded shapefiles.
    #[default]
    ShapefileAnalysis,
    /// Road-corridor impact analysis.
    RoadBuffer,
    /// Nearest-hospital search.
    ProximityAnalysis,
}

impl Section {
    /// The tool context this section runs under, given the current
    /// shapefile tool selector value.
    #[must_use]
    pub const fn context(self, tool: ShapefileTool) -> ToolContext {
        match self {
            Self::ShapefileAnalysis => tool.context(),
            Self::RoadBuffer => ToolContext::RoadBuffer,
            Self::ProximityAnalysis => ToolContext::Proximity,
        }
    }
}

/// Value of the shapefile-analysis tool selector.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShapefileTool {
    /// No panel visible.
    #[default]
    None,
    /// Buffer panel.
    Buffer,
    /// Intersect panel.
    Intersect,
    /// Union panel.
    Union,
}

impl ShapefileTool {
    /// The matching tool context.
    #[must_use]
    pub const fn context(self) -> ToolContext {
        match self {
            Self::None => ToolContext::None,
            Self::Buffer => ToolContext::Buffer,
            Self::Intersect => ToolContext::Intersect,
            Self::Union => ToolContext::Union,
        }
    }
}

/// Background tile layer.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BaseMap {
    /// `OpenStreetMap` standard tiles.
    #[default]
    OpenStreetMap,
    /// Esri world imagery.
    Satellite,
    /// `OpenTopoMap`.
    Topographic,
}

impl BaseMap {
    /// XYZ tile URL template.
    #[must_use]
    pub const fn tile_url(self) -> &'static str {
        match self {
            Self::OpenStreetMap => "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
            Self::Satellite => {
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}"
            }
            Self::Topographic => "https://{s}.tile.opentopomap.org/{z}/{x}/{y}.png",
        }
    }

    /// Highest zoom level the tile server provides.
    #[must_use]
    pub const fn max_zoom(self) -> u8 {
        match self {
            Self::OpenStreetMap | Self::Satellite => 19,
            Self::Topographic => 17,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, polygon};
    use std::str::FromStr as _;

    #[test]
    fn geometry_families() {
        let point: geo::Geometry<f64> = geo::point!(x: 1.0, y: 2.0).into();
        let line: geo::Geometry<f64> = geo::line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)].into();
        let area: geo::Geometry<f64> = geo::polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]
        .into();

        assert_eq!(GeometryFamily::of(&point), GeometryFamily::Point);
        assert_eq!(GeometryFamily::of(&line), GeometryFamily::Line);
        assert_eq!(GeometryFamily::of(&area), GeometryFamily::Area);
    }

    #[test]
    fn retain_families_counts_dropped() {
        let collection = FeatureCollection::new(
            DataSource::Buildings,
            vec![
                Feature::new(geo::point!(x: 1.0, y: 2.0)),
                Feature::new(geo::line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]),
                Feature::new(geo::point!(x: 3.0, y: 4.0)),
            ],
        );

        let (kept, dropped) = collection.retain_families(&[GeometryFamily::Point]);
        assert_eq!(kept.len(), 2);
        assert_eq!(dropped, 1);
        assert_eq!(kept.source(), DataSource::Buildings);
    }

    #[test]
    fn property_rendering() {
        let feature = Feature::new(geo::point!(x: 0.0, y: 0.0))
            .with_property("id", 42)
            .with_property("name", "Dhulikhel Hospital")
            .with_property("type", "");

        assert_eq!(feature.id_label(), "42");
        assert_eq!(feature.property("name").as_deref(), Some("Dhulikhel Hospital"));
        assert_eq!(feature.property("type"), None);
        assert_eq!(
            Feature::new(geo::point!(x: 0.0, y: 0.0)).id_label(),
            "Unknown"
        );
    }

    #[test]
    fn geojson_feature_without_geometry_is_rejected() {
        let feature = geojson::Feature {
            bbox: None,
            geometry: None,
            id: None,
            properties: None,
            foreign_members: None,
        };

        assert_eq!(
            Feature::from_geojson(feature),
            Err(FeatureConversionError::MissingGeometry)
        );
    }

    #[test]
    fn section_context_follows_tool_selector() {
        assert_eq!(
            Section::ShapefileAnalysis.context(ShapefileTool::Union),
            ToolContext::Union
        );
        assert_eq!(
            Section::RoadBuffer.context(ShapefileTool::Union),
            ToolContext::RoadBuffer
        );
        assert_eq!(
            Section::ProximityAnalysis.context(ShapefileTool::None),
            ToolContext::Proximity
        );
    }

    #[test]
    fn context_names_parse() {
        assert_eq!(
            ToolContext::from_str("road-buffer").ok(),
            Some(ToolContext::RoadBuffer)
        );
        assert_eq!(
            Section::from_str("proximity-analysis").ok(),
            Some(Section::ProximityAnalysis)
        );
        assert_eq!(ToolContext::Proximity.entry_sources().len(), 2);
    }

    #[test]
    fn remote_sources_exclude_upload_slots() {
        let remote: Vec<DataSource> = DataSource::remote().collect();
        assert_eq!(remote.len(), 6);
        assert!(!remote.contains(&DataSource::ShapefileA));
    }
}
