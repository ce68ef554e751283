//! In-memory [`MapRenderer`] that retains what would be on screen.
//!
//! Used as the headless renderer behind the CLI and as the observable
//! renderer in tests. [`MapScene::to_geojson`] serialises the visible
//! layers in draw order.

use std::collections::BTreeSet;

use impact_map_layer_models::BaseMap;

use crate::renderer::{Control, LayerGroup, LayerId, MapRenderer};

/// Initial map centre (longitude, latitude).
pub const DEFAULT_CENTER: (f64, f64) = (85.5394, 27.6201);
/// Initial zoom level.
pub const DEFAULT_ZOOM: u8 = 13;

/// Centre and zoom of the visible map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Centre point.
    pub center: geo::Point<f64>,
    /// Web-mercator zoom level.
    pub zoom: u8,
    /// Last bounds fitted, if any.
    pub bounds: Option<geo::Rect<f64>>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: geo::Point::new(DEFAULT_CENTER.0, DEFAULT_CENTER.1),
            zoom: DEFAULT_ZOOM,
            bounds: None,
        }
    }
}

#[derive(Debug, Clone)]
struct SceneGroup {
    group: LayerGroup,
    colors: Vec<String>,
    popups: Vec<String>,
}

/// Retained-mode map state.
#[derive(Debug, Clone, Default)]
pub struct MapScene {
    groups: Vec<SceneGroup>,
    open_popup: Option<(LayerId, usize)>,
    viewport: Viewport,
    base_map: BaseMap,
    controls: BTreeSet<Control>,
}

impl MapScene {
    /// Creates an empty scene at the default viewport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, id: LayerId) -> Option<&SceneGroup> {
        self.groups.iter().find(|g| g.group.id == id)
    }

    fn find_mut(&mut self, id: LayerId) -> Option<&mut SceneGroup> {
        self.groups.iter_mut().find(|g| g.group.id == id)
    }

    /// Ids of the drawn groups, bottom to top.
    #[must_use]
    pub fn draw_order(&self) -> Vec<LayerId> {
        let mut ordered: Vec<&SceneGroup> = self.groups.iter().collect();
        ordered.sort_by_key(|g| g.group.pane);
        ordered.into_iter().map(|g| g.group.id).collect()
    }

    /// Number of drawn groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Label of a drawn group.
    #[must_use]
    pub fn label(&self, id: LayerId) -> Option<&str> {
        self.find(id).map(|g| g.group.label.as_str())
    }

    /// Labels of every drawn group, bottom to top.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.draw_order()
            .into_iter()
            .filter_map(|id| self.label(id))
            .collect()
    }

    /// Number of members in a drawn group.
    #[must_use]
    pub fn feature_count(&self, id: LayerId) -> Option<usize> {
        self.find(id).map(|g| g.group.features.len())
    }

    /// Current stroke colour of one member.
    #[must_use]
    pub fn feature_color(&self, id: LayerId, index: usize) -> Option<&str> {
        self.find(id)?.colors.get(index).map(String::as_str)
    }

    /// Popup text of one member.
    #[must_use]
    pub fn popup_text(&self, id: LayerId, index: usize) -> Option<&str> {
        self.find(id)?.popups.get(index).map(String::as_str)
    }

    /// The open popup, if any.
    #[must_use]
    pub const fn open_popup(&self) -> Option<(LayerId, usize)> {
        self.open_popup
    }

    /// Current viewport.
    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Current background tiles.
    #[must_use]
    pub const fn base_map(&self) -> BaseMap {
        self.base_map
    }

    /// Whether a control is shown.
    #[must_use]
    pub fn is_control_visible(&self, control: Control) -> bool {
        self.controls.contains(&control)
    }

    /// Serialises the visible groups, bottom to top. Each feature gains
    /// `layer`, `layer_id`, `pane` and `color` properties, and the
    /// collection carries the base map name and tile URL as foreign
    /// members.
    #[must_use]
    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        let features = self
            .draw_order()
            .into_iter()
            .filter_map(|id| self.find(id))
            .flat_map(|scene_group| {
                scene_group
                    .group
                    .features
                    .iter()
                    .zip(&scene_group.colors)
                    .map(move |(rendered, color)| {
                        let mut feature = rendered.feature.to_geojson();
                        let properties = feature.properties.get_or_insert_with(Default::default);
                        properties.insert("layer".into(), scene_group.group.label.clone().into());
                        properties.insert("layer_id".into(), scene_group.group.id.value().into());
                        properties.insert("pane".into(), scene_group.group.pane.as_ref().into());
                        properties.insert("color".into(), color.clone().into());
                        feature
                    })
            })
            .collect();

        let mut base_map = serde_json::Map::new();
        base_map.insert("base_map".into(), self.base_map.as_ref().into());
        base_map.insert("tile_url".into(), self.base_map.tile_url().into());

        geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(base_map),
        }
    }
}

/// Zoom level at which `bounds` roughly fills a 256px-tile viewport.
fn zoom_for(bounds: geo::Rect<f64>, max_zoom: u8) -> u8 {
    let span = bounds.width().max(bounds.height());
    if span <= 0.0 {
        return max_zoom;
    }
    let zoom = (360.0 / span).log2().floor().clamp(0.0, f64::from(max_zoom));
    // Clamped to 0..=max_zoom above.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let zoom = zoom as u8;
    zoom
}

impl MapRenderer for MapScene {
    fn add_group(&mut self, group: &LayerGroup) {
        if self.find(group.id).is_some() {
            return;
        }
        log::debug!("Adding {} ({}) to {} pane", group.label, group.id, group.pane);
        self.groups.push(SceneGroup {
            colors: vec![group.style.color.to_string(); group.features.len()],
            popups: group.features.iter().map(|f| f.popup.clone()).collect(),
            group: group.clone(),
        });
    }

    fn remove_group(&mut self, id: LayerId) {
        self.groups.retain(|g| g.group.id != id);
        if self.open_popup.is_some_and(|(open, _)| open == id) {
            self.open_popup = None;
        }
    }

    fn has_group(&self, id: LayerId) -> bool {
        self.find(id).is_some()
    }

    fn set_feature_color(&mut self, id: LayerId, index: usize, color: &str) {
        if let Some(slot) = self.find_mut(id).and_then(|g| g.colors.get_mut(index)) {
            *slot = color.to_string();
        }
    }

    fn bind_popup(&mut self, id: LayerId, text: &str) {
        if let Some(group) = self.find_mut(id) {
            for popup in &mut group.popups {
                popup.clear();
                popup.push_str(text);
            }
        }
    }

    fn open_popup(&mut self, id: LayerId, index: usize) {
        if self.find(id).is_some_and(|g| index < g.popups.len()) {
            self.open_popup = Some((id, index));
        }
    }

    fn close_popup(&mut self) {
        self.open_popup = None;
    }

    fn fit_bounds(&mut self, bounds: geo::Rect<f64>) {
        self.viewport = Viewport {
            center: bounds.center().into(),
            zoom: zoom_for(bounds, self.base_map.max_zoom()),
            bounds: Some(bounds),
        };
    }

    fn set_base_map(&mut self, base: BaseMap) {
        self.base_map = base;
        self.viewport.zoom = self.viewport.zoom.min(base.max_zoom());
    }

    fn set_control_visible(&mut self, control: Control, visible: bool) {
        if visible {
            self.controls.insert(control);
        } else {
            self.controls.remove(&control);
        }
    }
}
