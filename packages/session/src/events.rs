//! Map and keyboard events.

use strum_macros::{Display, EnumString};

use crate::{
    SessionError,
    renderer::{LayerId, MapRenderer},
    selection::ClickOutcome,
    state::Session,
};
use impact_map_layer_models::ToolContext;

/// Keys the session reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Display, EnumString)]
pub enum Key {
    /// Removes the selected feature's group.
    Delete,
    /// Anything else.
    #[strum(default)]
    Other(String),
}

/// User input delivered by the map front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// A drawn feature was clicked.
    FeatureClicked {
        /// Group of the clicked feature.
        layer: LayerId,
        /// Member index within the group.
        index: usize,
    },
    /// The map background was clicked.
    BackgroundClicked {
        /// Clicked location.
        at: geo::Point<f64>,
    },
    /// A key was pressed.
    KeyPressed(Key),
}

/// What handling an event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// A feature click.
    Click(ClickOutcome),
    /// A background click marked a point.
    PointMarked(LayerId),
    /// A background click cleared both selections.
    SelectionsCleared,
    /// The delete key removed a group.
    Removed(LayerId),
    /// Nothing happened.
    Ignored,
}

impl<R: MapRenderer> Session<R> {
    /// Dispatches one event.
    ///
    /// Background clicks mark a point while point selection is armed in
    /// the proximity tool and clear both selections otherwise. The delete
    /// key only acts when something is selected.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownLayer`] for a click on a feature the
    /// session did not draw.
    pub fn handle(&mut self, event: MapEvent) -> Result<EventOutcome, SessionError> {
        match event {
            MapEvent::FeatureClicked { layer, index } => {
                Ok(EventOutcome::Click(self.click_feature(layer, index)?))
            }
            MapEvent::BackgroundClicked { at } => {
                if self.point_selection_armed && self.context == ToolContext::Proximity {
                    Ok(EventOutcome::PointMarked(self.mark_point(at)?))
                } else {
                    self.clear_selection();
                    self.clear_road_selection();
                    Ok(EventOutcome::SelectionsCleared)
                }
            }
            MapEvent::KeyPressed(Key::Delete) if self.selection.is_some() => {
                Ok(EventOutcome::Removed(self.remove_selected()?))
            }
            MapEvent::KeyPressed(_) => Ok(EventOutcome::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MapScene, testing};
    use impact_map_layer_models::{DataSource, Slot};
    use std::str::FromStr as _;

    #[test]
    fn delete_key_removes_selected_group() {
        let mut session = Session::new(MapScene::new());
        let layer = session.set_slot(Slot::A, testing::squares(DataSource::ShapefileA, &[0.0, 1.0]), "a");

        session
            .handle(MapEvent::FeatureClicked { layer, index: 0 })
            .unwrap();
        let outcome = session.handle(MapEvent::KeyPressed(Key::Delete)).unwrap();

        assert_eq!(outcome, EventOutcome::Removed(layer));
        assert!(!session.renderer().has_group(layer));
    }

    #[test]
    fn delete_key_without_selection_is_ignored() {
        let mut session = Session::new(MapScene::new());
        let outcome = session.handle(MapEvent::KeyPressed(Key::Delete)).unwrap();
        assert_eq!(outcome, EventOutcome::Ignored);
    }

    #[test]
    fn background_click_clears_selection() {
        let mut session = Session::new(MapScene::new());
        let layer = session.set_slot(Slot::A, testing::squares(DataSource::ShapefileA, &[0.0]), "a");
        session.click_feature(layer, 0).unwrap();

        let outcome = session
            .handle(MapEvent::BackgroundClicked {
                at: geo::point!(x: 80.0, y: 20.0),
            })
            .unwrap();

        assert_eq!(outcome, EventOutcome::SelectionsCleared);
        assert_eq!(session.selection(), None);
    }

    #[test]
    fn key_names_parse() {
        assert_eq!(Key::from_str("Delete").unwrap(), Key::Delete);
        assert_eq!(Key::from_str("x").unwrap(), Key::Other("x".to_string()));
    }
}
