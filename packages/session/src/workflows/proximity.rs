//! Nearest-hospital search around a marked point.

use impact_map_geometry::{buffer, centroid, distance_km, line_between};
use impact_map_layer_models::{DataSource, Feature, ToolContext};

use super::require_distance;
use crate::{
    SessionError,
    renderer::{LayerId, MapRenderer, Pane},
    state::{Session, rendered},
    style::{self, LayerStyle},
};

/// The hospital found by a proximity search.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestHospital {
    /// `id` property, or `Unknown`.
    pub id: String,
    /// `name` property, or `N/A`.
    pub name: String,
    /// `type` property, or `N/A`.
    pub kind: String,
    /// Great-circle distance from the marked point to the hospital
    /// centroid.
    pub distance_km: f64,
    /// Search radius layer.
    pub radius: LayerId,
    /// Hospital marker layer.
    pub marker: LayerId,
    /// Connector line layer.
    pub line: LayerId,
}

/// Outcome of a proximity search.
#[derive(Debug, Clone, PartialEq)]
pub enum ProximityOutcome {
    /// A hospital lies within the radius.
    Found(NearestHospital),
    /// No hospital lies within the radius. Nothing was drawn.
    NoneFound,
}

impl std::fmt::Display for ProximityOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Found(hospital) => {
                writeln!(f, "Nearest Hospital")?;
                writeln!(f, "Hospital ID: {}", hospital.id)?;
                writeln!(f, "Name: {}", hospital.name)?;
                writeln!(f, "Type: {}", hospital.kind)?;
                write!(f, "Distance: {:.2} km", hospital.distance_km)
            }
            Self::NoneFound => write!(f, "No hospitals found within the specified radius."),
        }
    }
}

impl<R: MapRenderer> Session<R> {
    /// Arms point selection: subsequent background clicks mark a location
    /// until the context changes or selection is disarmed. Any previous
    /// mark and analysis results are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Precondition`] outside the proximity tool.
    pub fn arm_point_selection(&mut self) -> Result<(), SessionError> {
        if self.context != ToolContext::Proximity {
            return Err(SessionError::precondition(
                "Point selection is only available in the proximity analysis tool.",
            ));
        }

        self.remove_marked_point();
        self.clear_analysis_results();
        self.point_selection_armed = true;
        log::info!("Click on the map to mark a location.");
        Ok(())
    }

    /// Stops background clicks from marking locations.
    pub fn disarm_point_selection(&mut self) {
        self.point_selection_armed = false;
    }

    /// Marks `at`, replacing the previous mark and analysis results.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Precondition`] unless point selection is
    /// armed.
    pub fn mark_point(&mut self, at: geo::Point<f64>) -> Result<LayerId, SessionError> {
        if !self.point_selection_armed {
            return Err(SessionError::precondition("Point selection is not active."));
        }

        self.remove_marked_point();
        self.clear_analysis_results();

        let marker = Feature::new(at);
        let layer = self.install(
            "Marked Location",
            Pane::Analysis,
            LayerStyle::MARKED_POINT,
            rendered([&marker], |_| "Marked Location".to_string()),
        );
        self.arm_selectable(layer, "Marked Location");
        self.marked_point = Some((at, layer));

        self.fit_to(layer);
        self.show_infrastructure();
        log::info!("Location marked at ({:.5}, {:.5})", at.x(), at.y());
        Ok(layer)
    }

    fn remove_marked_point(&mut self) {
        if let Some((_, layer)) = self.marked_point.take() {
            self.discard(layer);
        }
    }

    /// Finds the hospital nearest the marked point within `km` kilometres.
    /// Distances are measured to each hospital's centroid; on a tie the
    /// hospital loaded first wins.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Precondition`] without a marked point,
    /// without hospital data or with an invalid radius, and
    /// [`SessionError::Geometry`] if the search radius cannot be built.
    pub fn run_proximity(&mut self, km: f64) -> Result<ProximityOutcome, SessionError> {
        let (origin, marker_layer) = self.marked_point.ok_or_else(|| {
            SessionError::precondition(
                "Please mark a location on the map by clicking 'Mark Location' and selecting a point.",
            )
        })?;
        let hospitals = self.infrastructure(DataSource::Hospitals).ok_or_else(|| {
            SessionError::precondition("Hospital data not loaded. Please ensure data is fetched from the server.")
        })?;
        let km = require_distance(km, "Please enter a valid positive search radius in kilometers.")?;

        let origin_geometry = geo::Geometry::Point(origin);
        let search_area = Feature::new(buffer(&origin_geometry, km)?);

        let mut nearest: Option<(&Feature, geo::Point<f64>, f64)> = None;
        for hospital in hospitals.collection().features() {
            let center = match centroid(&hospital.geometry) {
                Ok(center) => center,
                Err(e) => {
                    log::warn!("Error processing hospital ID {}: {e}", hospital.id_label());
                    continue;
                }
            };
            let distance = distance_km(origin, center);
            if distance <= km && nearest.is_none_or(|(_, _, best)| distance < best) {
                nearest = Some((hospital, center, distance));
            }
        }

        let Some((hospital, center, distance)) = nearest else {
            log::info!("No hospitals within {km} km");
            return Ok(ProximityOutcome::NoneFound);
        };
        let hospital = hospital.clone();
        let connector = Feature::new(line_between(origin, center));

        self.clear_analysis_results();
        let radius = self.push_analysis_result(
            "Search Radius",
            Pane::Analysis,
            LayerStyle::SEARCH_RADIUS,
            rendered([&search_area], |_| "Search Radius".to_string()),
        );
        self.show(marker_layer);
        let marker = self.push_analysis_result(
            "Nearest Hospital",
            Pane::Analysis,
            LayerStyle::NEAREST_HOSPITAL,
            rendered([&hospital], style::hospital_popup),
        );
        let line = self.push_analysis_result(
            "Distance Line",
            Pane::Analysis,
            LayerStyle::DISTANCE_LINE,
            rendered([&connector], |_| format!("Distance: {distance:.2} km")),
        );

        self.fit_to(radius);
        self.show_infrastructure();
        log::info!("Nearest hospital {} at {distance:.2} km", hospital.id_label());

        Ok(ProximityOutcome::Found(NearestHospital {
            id: hospital.id_label(),
            name: hospital.property("name").unwrap_or_else(|| "N/A".to_string()),
            kind: hospital.property("type").unwrap_or_else(|| "N/A".to_string()),
            distance_km: distance,
            radius,
            marker,
            line,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventOutcome, MapEvent, MapScene, testing};
    use impact_map_layer_models::{GeometryFamily, Section};

    async fn ready() -> Session<MapScene> {
        let provider = testing::proximity_provider();
        let mut session = Session::new(MapScene::new());
        let ticket = session.switch_section(Section::ProximityAnalysis).unwrap();
        session.run_load(ticket, &provider).await.unwrap();
        session
    }

    fn click(session: &mut Session<MapScene>, x: f64, y: f64) -> EventOutcome {
        session
            .handle(MapEvent::BackgroundClicked {
                at: geo::point!(x: x, y: y),
            })
            .unwrap()
    }

    #[tokio::test]
    async fn picks_nearest_hospital_within_radius() {
        let mut session = ready().await;
        session.arm_point_selection().unwrap();
        click(&mut session, testing::ORIGIN.0, testing::ORIGIN.1);

        let outcome = session.run_proximity(4.0).unwrap();

        let ProximityOutcome::Found(hospital) = &outcome else {
            panic!("expected a hospital, got {outcome:?}");
        };
        assert_eq!(hospital.id, "h1");
        assert_eq!(hospital.kind, "General");
        assert!((hospital.distance_km - 1.0).abs() < 1e-6);
        assert!(outcome.to_string().ends_with("Distance: 1.00 km"));
        assert_eq!(
            session.analysis_results(),
            &[hospital.radius, hospital.marker, hospital.line]
        );
        assert_eq!(
            session.layer(hospital.line).unwrap().features[0].feature.family(),
            GeometryFamily::Line
        );
    }

    #[tokio::test]
    async fn equally_distant_hospitals_keep_the_first_loaded() {
        let provider = testing::tied_hospitals_provider();
        let mut session = Session::new(MapScene::new());
        let ticket = session.switch_section(Section::ProximityAnalysis).unwrap();
        session.run_load(ticket, &provider).await.unwrap();
        session.arm_point_selection().unwrap();
        click(&mut session, testing::ORIGIN.0, testing::ORIGIN.1);

        let outcome = session.run_proximity(2.0).unwrap();

        let ProximityOutcome::Found(hospital) = outcome else {
            panic!("expected a hospital, got {outcome:?}");
        };
        assert_eq!(hospital.id, "first");
    }

    #[tokio::test]
    async fn small_radius_finds_nothing() {
        let mut session = ready().await;
        session.arm_point_selection().unwrap();
        click(&mut session, testing::ORIGIN.0, testing::ORIGIN.1);
        let groups = session.renderer().group_count();

        let outcome = session.run_proximity(0.5).unwrap();

        assert_eq!(outcome, ProximityOutcome::NoneFound);
        assert_eq!(outcome.to_string(), "No hospitals found within the specified radius.");
        assert_eq!(session.renderer().group_count(), groups);
        assert!(session.analysis_results().is_empty());
    }

    #[tokio::test]
    async fn each_click_replaces_the_mark() {
        let mut session = ready().await;
        session.arm_point_selection().unwrap();

        let EventOutcome::PointMarked(first) = click(&mut session, 85.54, 27.62) else {
            panic!("expected a mark");
        };
        session.run_proximity(4.0).unwrap();
        let EventOutcome::PointMarked(second) = click(&mut session, 85.55, 27.63) else {
            panic!("expected a mark");
        };

        assert!(!session.renderer().has_group(first));
        assert!(session.renderer().has_group(second));
        assert!(session.analysis_results().is_empty());
        assert_eq!(session.marked_point(), Some(geo::point!(x: 85.55, y: 27.63)));
        assert!(session.is_point_selection_armed());
    }

    #[tokio::test]
    async fn repeated_searches_do_not_accumulate() {
        let mut session = ready().await;
        session.arm_point_selection().unwrap();
        click(&mut session, testing::ORIGIN.0, testing::ORIGIN.1);

        session.run_proximity(4.0).unwrap();
        session.run_proximity(10.0).unwrap();

        assert_eq!(session.analysis_results().len(), 3);
        assert_eq!(
            session
                .renderer()
                .labels()
                .iter()
                .filter(|label| **label == "Search Radius")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn removed_mark_is_shown_again_by_search() {
        let mut session = ready().await;
        session.arm_point_selection().unwrap();
        let EventOutcome::PointMarked(mark) = click(&mut session, testing::ORIGIN.0, testing::ORIGIN.1) else {
            panic!("expected a mark");
        };
        session.click_feature(mark, 0).unwrap();
        session.remove_selected().unwrap();
        assert!(!session.renderer().has_group(mark));

        session.run_proximity(4.0).unwrap();

        assert!(session.renderer().has_group(mark));
    }

    #[tokio::test]
    async fn requires_marked_point() {
        let mut session = ready().await;
        let err = session.run_proximity(4.0).unwrap_err();
        assert!(matches!(err, SessionError::Precondition(_)));
    }

    #[tokio::test]
    async fn disarmed_clicks_clear_selection_instead() {
        let mut session = ready().await;
        session.arm_point_selection().unwrap();
        session.disarm_point_selection();

        assert_eq!(click(&mut session, 85.54, 27.62), EventOutcome::SelectionsCleared);
        assert_eq!(session.marked_point(), None);
    }

    #[tokio::test]
    async fn context_switch_disarms_and_drops_mark() {
        let mut session = ready().await;
        session.arm_point_selection().unwrap();
        click(&mut session, 85.54, 27.62);

        let _ = session.switch_section(Section::RoadBuffer);

        assert!(!session.is_point_selection_armed());
        assert_eq!(session.marked_point(), None);
    }

    #[test]
    fn arming_requires_proximity_context() {
        let mut session = Session::new(MapScene::new());
        assert!(session.arm_point_selection().is_err());
    }
}
