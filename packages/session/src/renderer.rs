//! Map renderer abstraction.
//!
//! The session decides what is on the map; a [`MapRenderer`] only draws
//! what it is told to. It receives whole [`LayerGroup`]s to add, layer ids
//! to remove, and per-feature colour and popup updates. It never tracks
//! layer lifecycle on its own.

use impact_map_layer_models::{BaseMap, Feature};
use strum_macros::{AsRefStr, Display};

use crate::style::LayerStyle;

/// Identity of a rendered layer group, unique within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub(crate) u64);

impl LayerId {
    /// Numeric value, for display and export.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer-{}", self.0)
    }
}

/// Drawing tier. Everything in [`Pane::Analysis`] draws above
/// [`Pane::Overlay`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Pane {
    /// Boundary overlays, uploads, infrastructure, set-operation results.
    #[default]
    Overlay,
    /// Road-corridor and proximity output, marked point.
    Analysis,
}

/// UI controls whose visibility follows session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Control {
    /// "Remove selected" button for the general selection.
    RemoveSelected,
    /// "Remove selected road" button in the road-corridor tool.
    RemoveSelectedRoad,
}

/// One feature as handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFeature {
    /// Source feature.
    pub feature: Feature,
    /// Popup text shown on click.
    pub popup: String,
}

/// A styled group of features added to and removed from the map as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerGroup {
    /// Group identity.
    pub id: LayerId,
    /// Human-readable name.
    pub label: String,
    /// Drawing tier.
    pub pane: Pane,
    /// Base style applied to every member.
    pub style: LayerStyle,
    /// Members, in source order.
    pub features: Vec<RenderedFeature>,
}

impl LayerGroup {
    /// Bounding rectangle of every member.
    #[must_use]
    pub fn bounds(&self) -> Option<geo::Rect<f64>> {
        impact_map_geometry::bounds(self.features.iter().map(|f| &f.feature))
    }
}

/// Receives draw instructions from the session.
///
/// All methods must tolerate ids that are not (or no longer) on the map.
pub trait MapRenderer {
    /// Draws a group. Adding a group that is already shown is a no-op.
    fn add_group(&mut self, group: &LayerGroup);

    /// Stops drawing a group.
    fn remove_group(&mut self, id: LayerId);

    /// Whether a group is currently drawn.
    fn has_group(&self, id: LayerId) -> bool;

    /// Overrides the stroke colour of one member.
    fn set_feature_color(&mut self, id: LayerId, index: usize, color: &str);

    /// Replaces the popup text of every member of a group.
    fn bind_popup(&mut self, id: LayerId, text: &str);

    /// Opens one member's popup, closing any other.
    fn open_popup(&mut self, id: LayerId, index: usize);

    /// Closes the open popup, if any.
    fn close_popup(&mut self);

    /// Moves the viewport to show `bounds`.
    fn fit_bounds(&mut self, bounds: geo::Rect<f64>);

    /// Switches the background tiles.
    fn set_base_map(&mut self, base: BaseMap);

    /// Shows or hides a UI control.
    fn set_control_visible(&mut self, control: Control, visible: bool);
}
