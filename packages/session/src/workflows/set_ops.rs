//! Buffer, intersect and union over the two upload slots.

use impact_map_geometry::{buffer_features, intersection, intersects, union};
use impact_map_layer_models::{Feature, FeatureCollection, Slot};

use super::require_distance;
use crate::{
    SessionError,
    renderer::{LayerId, MapRenderer, Pane},
    state::{Session, rendered},
    style::LayerStyle,
};

/// Outcome of a buffer, intersect or union run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOpOutcome {
    /// A result layer replaced the previous analysis result set.
    Produced {
        /// The result layer.
        layer: LayerId,
        /// Number of result features.
        features: usize,
    },
    /// No pair of features intersected. Nothing was drawn.
    NoIntersections,
    /// No pair of features produced a union. Nothing was drawn.
    NoUnions,
}

impl std::fmt::Display for SetOpOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Produced { features, .. } => write!(f, "{features} result features added."),
            Self::NoIntersections => write!(f, "No intersections found."),
            Self::NoUnions => write!(f, "No valid unions found."),
        }
    }
}

impl<R: MapRenderer> Session<R> {
    /// Buffers every feature of slot A by `km` kilometres.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Precondition`] without slot A or with an
    /// invalid distance, and [`SessionError::Geometry`] if any feature
    /// cannot be buffered.
    pub fn run_buffer(&mut self, km: f64) -> Result<SetOpOutcome, SessionError> {
        let slot_a = self
            .slot(Slot::A)
            .ok_or_else(|| SessionError::precondition("Upload Shapefile A first."))?;
        let km = require_distance(km, "Enter a valid positive distance.")?;

        let buffered = buffer_features(slot_a.collection(), km)?;
        log::info!("Buffered {} features by {km} km", buffered.len());

        Ok(self.replace_results("Buffer Result", LayerStyle::BUFFER_RESULT, &buffered))
    }

    /// Intersects every feature of slot A with every feature of slot B.
    /// Pairs whose bounding test fails are skipped, as are pairs the
    /// geometry engine cannot intersect.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Precondition`] unless both slots are loaded.
    pub fn run_intersect(&mut self) -> Result<SetOpOutcome, SessionError> {
        let (a, b) = self.operands()?;

        let mut results = Vec::new();
        for fa in a.features() {
            for fb in b.features() {
                if !intersects(&fa.geometry, &fb.geometry) {
                    continue;
                }
                match intersection(&fa.geometry, &fb.geometry) {
                    Ok(Some(geometry)) => results.push(Feature::new(geometry)),
                    Ok(None) => {}
                    Err(e) => log::warn!("Intersection skipped for a feature pair: {e}"),
                }
            }
        }

        if results.is_empty() {
            log::info!("Intersect: no intersections found");
            return Ok(SetOpOutcome::NoIntersections);
        }
        log::info!("Intersect: {} results", results.len());

        Ok(self.replace_results("Intersect Result", LayerStyle::INTERSECT_RESULT, &results))
    }

    /// Unions every feature of slot A with every feature of slot B. A pair
    /// that fails is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Precondition`] unless both slots are loaded.
    pub fn run_union(&mut self) -> Result<SetOpOutcome, SessionError> {
        let (a, b) = self.operands()?;

        let mut results = Vec::new();
        for fa in a.features() {
            for fb in b.features() {
                match union(&fa.geometry, &fb.geometry) {
                    Ok(Some(geometry)) => results.push(Feature::new(geometry)),
                    Ok(None) => {}
                    Err(e) => log::warn!("Union operation failed for some features: {e}"),
                }
            }
        }

        if results.is_empty() {
            log::info!("Union: no valid unions found");
            return Ok(SetOpOutcome::NoUnions);
        }
        log::info!("Union: {} results", results.len());

        Ok(self.replace_results("Union Result", LayerStyle::UNION_RESULT, &results))
    }

    fn operands(&self) -> Result<(&FeatureCollection, &FeatureCollection), SessionError> {
        match (self.slot(Slot::A), self.slot(Slot::B)) {
            (Some(a), Some(b)) => Ok((a.collection(), b.collection())),
            _ => Err(SessionError::precondition("Upload both shapefiles.")),
        }
    }

    fn replace_results(&mut self, label: &str, style: LayerStyle, features: &[Feature]) -> SetOpOutcome {
        self.clear_analysis_results();

        let layer = self.push_analysis_result(
            label,
            Pane::Overlay,
            style,
            rendered(features, |_| label.to_string()),
        );
        self.fit_to(layer);
        self.clear_selection();

        SetOpOutcome::Produced {
            layer,
            features: features.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MapScene, testing};
    use geo::line_string;
    use impact_map_layer_models::DataSource;

    fn with_slots(a: Vec<Feature>, b: Vec<Feature>) -> Session<MapScene> {
        let mut session = Session::new(MapScene::new());
        session.set_slot(Slot::A, FeatureCollection::new(DataSource::ShapefileA, a), "a");
        session.set_slot(Slot::B, FeatureCollection::new(DataSource::ShapefileB, b), "b");
        session
    }

    #[test]
    fn buffer_requires_slot_a() {
        let mut session = Session::new(MapScene::new());
        let err = session.run_buffer(1.0).unwrap_err();
        assert_eq!(err.to_string(), "Upload Shapefile A first.");
    }

    #[test]
    fn buffer_rejects_invalid_distance_before_mutating() {
        let mut session = with_slots(vec![testing::point(85.54, 27.62)], Vec::new());
        let before = session.renderer().group_count();

        let err = session.run_buffer(-2.0).unwrap_err();

        assert_eq!(err.to_string(), "Enter a valid positive distance.");
        assert_eq!(session.renderer().group_count(), before);
        assert!(session.analysis_results().is_empty());
    }

    #[test]
    fn buffer_runs_replace_each_other() {
        let mut session = with_slots(vec![testing::point(85.54, 27.62)], Vec::new());

        session.run_buffer(1.0).unwrap();
        let outcome = session.run_buffer(2.0).unwrap();

        let SetOpOutcome::Produced { layer, features } = outcome else {
            panic!("expected a result layer, got {outcome:?}");
        };
        assert_eq!(features, 1);
        assert_eq!(session.analysis_results(), &[layer]);
        assert_eq!(
            session
                .renderer()
                .labels()
                .iter()
                .filter(|label| **label == "Buffer Result")
                .count(),
            1
        );
        assert_eq!(session.renderer().viewport().bounds, session.layer(layer).unwrap().bounds());
    }

    #[test]
    fn intersect_requires_both_slots() {
        let mut session = Session::new(MapScene::new());
        session.set_slot(Slot::A, testing::squares(DataSource::ShapefileA, &[0.0]), "a");
        let err = session.run_intersect().unwrap_err();
        assert_eq!(err.to_string(), "Upload both shapefiles.");
    }

    #[test]
    fn intersect_of_disjoint_inputs_adds_nothing() {
        let mut session = with_slots(
            vec![testing::square(85.50, 27.60, 0.01)],
            vec![testing::square(85.60, 27.70, 0.01)],
        );
        let groups = session.renderer().group_count();

        assert_eq!(session.run_intersect().unwrap(), SetOpOutcome::NoIntersections);
        assert_eq!(session.renderer().group_count(), groups);
        assert!(session.analysis_results().is_empty());
    }

    #[test]
    fn intersect_of_overlapping_squares() {
        let mut session = with_slots(
            vec![testing::square(85.500, 27.600, 0.01)],
            vec![testing::square(85.505, 27.605, 0.01)],
        );

        let outcome = session.run_intersect().unwrap();

        assert!(matches!(outcome, SetOpOutcome::Produced { features: 1, .. }));
        assert_eq!(session.analysis_results().len(), 1);
    }

    #[test]
    fn intersect_skips_failing_pairs() {
        let mut session = with_slots(
            vec![
                testing::square(85.500, 27.600, 0.01),
                Feature::new(geo::line_string![(x: 85.60, y: 27.70), (x: 85.62, y: 27.70)]),
            ],
            vec![
                testing::square(85.505, 27.605, 0.01),
                Feature::new(geo::line_string![(x: 85.61, y: 27.69), (x: 85.61, y: 27.71)]),
            ],
        );

        let outcome = session.run_intersect().unwrap();

        // The crossing lines intersect but cannot be overlaid.
        assert!(matches!(outcome, SetOpOutcome::Produced { features: 1, .. }));
        assert_eq!(session.analysis_results().len(), 1);
    }

    #[test]
    fn union_skips_failing_pairs() {
        let mut session = with_slots(
            vec![
                testing::square(85.500, 27.600, 0.01),
                testing::point(85.52, 27.62),
            ],
            vec![testing::square(85.505, 27.605, 0.01)],
        );

        let outcome = session.run_union().unwrap();

        assert!(matches!(outcome, SetOpOutcome::Produced { features: 1, .. }));
    }

    #[test]
    fn union_with_only_failing_pairs_reports_none() {
        let mut session = with_slots(
            vec![testing::point(85.52, 27.62)],
            vec![testing::square(85.505, 27.605, 0.01)],
        );
        assert_eq!(session.run_union().unwrap(), SetOpOutcome::NoUnions);
        assert_eq!(SetOpOutcome::NoUnions.to_string(), "No valid unions found.");
    }

    #[test]
    fn empty_run_keeps_previous_results() {
        let mut session = with_slots(
            vec![testing::square(85.50, 27.60, 0.01)],
            vec![testing::square(85.60, 27.70, 0.01)],
        );
        session.run_buffer(0.5).unwrap();
        let previous = session.analysis_results().to_vec();

        session.run_intersect().unwrap();

        assert_eq!(session.analysis_results(), previous.as_slice());
    }

    #[test]
    fn result_layers_are_selectable() {
        let mut session = with_slots(vec![testing::point(85.54, 27.62)], Vec::new());
        let SetOpOutcome::Produced { layer, .. } = session.run_buffer(1.0).unwrap() else {
            panic!("expected a result layer");
        };

        assert_eq!(session.renderer().popup_text(layer, 0), Some("Buffer Result"));
        session.click_feature(layer, 0).unwrap();
        session.remove_selected().unwrap();

        assert!(session.analysis_results().is_empty());
        assert!(session.layer(layer).is_none());
    }
}
