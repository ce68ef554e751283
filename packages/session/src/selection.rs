//! Click-to-select, highlight, deselect and delete.
//!
//! Two independent single-slot selections exist. The general selection
//! spans every armed layer group in the session. The road selection only
//! exists over the roads layer of the road-corridor tool. Neither one
//! observes the other's clicks.

use impact_map_layer_models::{DataSource, ToolContext};
use strum_macros::Display;

use crate::{
    SessionError,
    renderer::{Control, LayerId, MapRenderer},
    state::{Armed, FeatureRef, Session, base_color},
    style::{HIGHLIGHT_COLOR, ROAD_COLOR, ROAD_HIGHLIGHT_COLOR},
};

/// What a feature click did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ClickOutcome {
    /// The feature became the general selection.
    Selected,
    /// The feature was already selected and is now deselected.
    Deselected,
    /// The road became the road selection.
    RoadSelected,
    /// The road was already selected and is now deselected.
    RoadDeselected,
    /// The feature is not selectable; its popup was opened.
    PopupOpened,
}

impl<R: MapRenderer> Session<R> {
    /// Makes every member of a group clickable for the general selection.
    /// Records the group's pre-highlight colour and replaces every member's
    /// popup with `label`.
    pub fn arm_selectable(&mut self, layer: LayerId, label: &str) {
        let Some(group) = self.layers.get(&layer) else {
            log::debug!("Cannot arm {layer}: not in the session");
            return;
        };

        let color = base_color(&group.style);
        self.renderer.bind_popup(layer, label);
        self.armed.insert(
            layer,
            Armed {
                label: label.to_string(),
                color,
            },
        );
    }

    /// Handles a click on one drawn feature.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownLayer`] if the feature is not on the
    /// map.
    pub fn click_feature(&mut self, layer: LayerId, index: usize) -> Result<ClickOutcome, SessionError> {
        let target = FeatureRef { layer, index };
        if self.feature(target).is_none() || !self.renderer.has_group(layer) {
            return Err(SessionError::UnknownLayer { layer, index });
        }

        if self.is_road_layer(layer) {
            return Ok(self.toggle_road(target));
        }
        if self.armed.contains_key(&layer) {
            return Ok(self.toggle_selection(target));
        }

        self.renderer.open_popup(layer, index);
        Ok(ClickOutcome::PopupOpened)
    }

    fn is_road_layer(&self, layer: LayerId) -> bool {
        self.context == ToolContext::RoadBuffer
            && self
                .infrastructure
                .get(&DataSource::Roads)
                .is_some_and(|roads| roads.layer == layer)
    }

    fn toggle_selection(&mut self, target: FeatureRef) -> ClickOutcome {
        if self.selection == Some(target) {
            self.clear_selection();
            return ClickOutcome::Deselected;
        }

        self.clear_selection();
        self.renderer
            .set_feature_color(target.layer, target.index, HIGHLIGHT_COLOR);
        self.renderer.open_popup(target.layer, target.index);
        self.renderer.set_control_visible(Control::RemoveSelected, true);
        self.selection = Some(target);
        ClickOutcome::Selected
    }

    fn toggle_road(&mut self, target: FeatureRef) -> ClickOutcome {
        if self.road_selection == Some(target) {
            self.clear_road_selection();
            return ClickOutcome::RoadDeselected;
        }

        self.clear_road_selection();
        self.renderer
            .set_feature_color(target.layer, target.index, ROAD_HIGHLIGHT_COLOR);
        self.renderer.open_popup(target.layer, target.index);
        self.renderer
            .set_control_visible(Control::RemoveSelectedRoad, true);
        self.road_selection = Some(target);
        ClickOutcome::RoadSelected
    }

    /// Reverts the highlighted feature, closes its popup and hides the
    /// "remove selected" control. No-op without a selection.
    pub fn clear_selection(&mut self) {
        let Some(selected) = self.selection.take() else {
            return;
        };

        if let Some(armed) = self.armed.get(&selected.layer) {
            self.renderer
                .set_feature_color(selected.layer, selected.index, armed.color);
        }
        self.renderer.close_popup();
        self.renderer
            .set_control_visible(Control::RemoveSelected, false);
    }

    /// Reverts the selected road to the base road colour and hides the
    /// "remove selected road" control. No-op without a road selection.
    pub fn clear_road_selection(&mut self) {
        let Some(road) = self.road_selection.take() else {
            return;
        };

        self.renderer
            .set_feature_color(road.layer, road.index, ROAD_COLOR);
        self.renderer
            .set_control_visible(Control::RemoveSelectedRoad, false);
    }

    /// Removes the whole group the selected feature belongs to. A group
    /// from the analysis result set is dropped from it as well.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Precondition`] if nothing is selected.
    pub fn remove_selected(&mut self) -> Result<LayerId, SessionError> {
        let Some(selected) = self.selection else {
            return Err(SessionError::precondition("No feature is selected."));
        };
        let layer = selected.layer;
        self.clear_selection();

        if let Some(position) = self.analysis.iter().position(|id| *id == layer) {
            self.analysis.remove(position);
            self.discard(layer);
        } else {
            self.hide(layer);
        }

        log::info!("Removed {layer} from the map");
        Ok(layer)
    }
}
