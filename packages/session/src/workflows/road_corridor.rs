//! Road-corridor impact analysis.
//!
//! Buffers the selected road and counts the buildings and hospitals that
//! fall inside the corridor. Point features must lie strictly within it;
//! anything else counts when it overlaps the corridor at all.

use impact_map_geometry::{buffer, intersection, is_within};
use impact_map_layer_models::{DataSource, Feature, FeatureCollection, GeometryFamily, ToolContext};

use super::require_distance;
use crate::{
    SessionError,
    renderer::{LayerId, MapRenderer, Pane},
    state::{Session, rendered},
    style::{self, LayerStyle},
};

/// Counts and layers produced by one corridor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpactReport {
    /// Buildings inside the corridor.
    pub buildings: usize,
    /// Hospitals inside the corridor.
    pub hospitals: usize,
    /// Corridor polygon layer.
    pub corridor: LayerId,
    /// Affected buildings layer.
    pub affected_buildings: LayerId,
    /// Affected hospitals layer.
    pub affected_hospitals: LayerId,
}

impl std::fmt::Display for ImpactReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Number of buildings affected: {}", self.buildings)?;
        write!(f, "Number of hospitals affected: {}", self.hospitals)
    }
}

impl<R: MapRenderer> Session<R> {
    /// Buffers the selected road by `km` kilometres and classifies every
    /// loaded building and hospital against the corridor.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Precondition`] when data is missing, no road
    /// is selected, the distance is invalid, or the selection is not a
    /// line; [`SessionError::Geometry`] if the road cannot be buffered.
    pub fn run_road_buffer(&mut self, km: f64) -> Result<ImpactReport, SessionError> {
        let (Some(buildings), Some(hospitals)) = (
            self.infrastructure(DataSource::Buildings),
            self.infrastructure(DataSource::Hospitals),
        ) else {
            return Err(missing_data());
        };
        if self.context != ToolContext::RoadBuffer || self.infrastructure(DataSource::Roads).is_none() {
            return Err(missing_data());
        }

        let road = self
            .road_selection
            .and_then(|selected| self.feature(selected))
            .ok_or_else(|| SessionError::precondition("Please select a road by clicking on it on the map."))?;
        let km = require_distance(km, "Please enter a valid positive buffer distance in kilometers.")?;
        if road.family() != GeometryFamily::Line {
            return Err(SessionError::precondition(
                "Invalid road geometry. Please select a valid LineString or MultiLineString road.",
            ));
        }

        let corridor: geo::Geometry<f64> = buffer(&road.geometry, km)?.into();
        let affected_buildings = affected(buildings.collection(), &corridor);
        let affected_hospitals = affected(hospitals.collection(), &corridor);
        log::info!(
            "Road buffer {km} km: {} buildings and {} hospitals affected",
            affected_buildings.len(),
            affected_hospitals.len()
        );

        self.clear_analysis_results();
        self.show_infrastructure();

        let corridor_feature = Feature::new(corridor);
        let corridor_layer = self.push_analysis_result(
            "Road Buffer",
            Pane::Analysis,
            LayerStyle::ROAD_BUFFER,
            rendered([&corridor_feature], |_| format!("Road Buffer ({km} km)")),
        );
        let buildings_layer = self.push_analysis_result(
            "Affected Buildings",
            Pane::Analysis,
            LayerStyle::AFFECTED_BUILDINGS,
            rendered(&affected_buildings, style::building_popup),
        );
        let hospitals_layer = self.push_analysis_result(
            "Affected Hospitals",
            Pane::Analysis,
            LayerStyle::AFFECTED_HOSPITALS,
            rendered(&affected_hospitals, style::hospital_popup),
        );

        self.fit_to(corridor_layer);
        self.clear_road_selection();

        Ok(ImpactReport {
            buildings: affected_buildings.len(),
            hospitals: affected_hospitals.len(),
            corridor: corridor_layer,
            affected_buildings: buildings_layer,
            affected_hospitals: hospitals_layer,
        })
    }
}

fn missing_data() -> SessionError {
    SessionError::precondition(
        "Road, building, or hospital data not loaded. Please ensure data is fetched from the server.",
    )
}

/// Features of `collection` that fall inside `corridor`. A feature the
/// geometry engine cannot test is logged and left out.
fn affected(collection: &FeatureCollection, corridor: &geo::Geometry<f64>) -> Vec<Feature> {
    let label = collection.source().label();

    collection
        .features()
        .iter()
        .filter(|feature| {
            if feature.family() == GeometryFamily::Point {
                return is_within(&feature.geometry, corridor);
            }
            match intersection(&feature.geometry, corridor) {
                Ok(overlap) => overlap.is_some(),
                Err(e) => {
                    log::warn!("Error processing {label} ID {}: {e}", feature.id_label());
                    false
                }
            }
        })
        .cloned()
        .collect()
}
