//! Session state: what is loaded, what is drawn, and the layer registry.

use std::collections::BTreeMap;

use impact_map_layer_models::{
    BaseMap, DataSource, Feature, FeatureCollection, Section, ShapefileTool, Slot, ToolContext,
};

use crate::{
    SessionError,
    renderer::{Control, LayerGroup, LayerId, MapRenderer, Pane, RenderedFeature},
    style::{self, FALLBACK_COLOR, LayerStyle},
};

/// A loaded collection together with the layer group drawing it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedLayer {
    pub(crate) collection: FeatureCollection,
    pub(crate) layer: LayerId,
    pub(crate) name: String,
}

impl LoadedLayer {
    /// The loaded features.
    #[must_use]
    pub const fn collection(&self) -> &FeatureCollection {
        &self.collection
    }

    /// The group drawing them.
    #[must_use]
    pub const fn layer(&self) -> LayerId {
        self.layer
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One member of a drawn layer group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureRef {
    /// Owning group.
    pub layer: LayerId,
    /// Member index within the group.
    pub index: usize,
}

/// Selection bookkeeping for a group armed with
/// [`Session::arm_selectable`].
#[derive(Debug, Clone)]
pub(crate) struct Armed {
    pub(crate) label: String,
    pub(crate) color: &'static str,
}

/// The analysis session. See the crate docs.
#[derive(Debug)]
pub struct Session<R: MapRenderer> {
    pub(crate) renderer: R,
    next_layer: u64,
    pub(crate) layers: BTreeMap<LayerId, LayerGroup>,
    pub(crate) armed: BTreeMap<LayerId, Armed>,
    slot_a: Option<LoadedLayer>,
    slot_b: Option<LoadedLayer>,
    pub(crate) boundaries: BTreeMap<DataSource, LoadedLayer>,
    pub(crate) infrastructure: BTreeMap<DataSource, LoadedLayer>,
    pub(crate) section: Section,
    pub(crate) tool: ShapefileTool,
    pub(crate) context: ToolContext,
    pub(crate) epoch: u64,
    pub(crate) selection: Option<FeatureRef>,
    pub(crate) road_selection: Option<FeatureRef>,
    pub(crate) point_selection_armed: bool,
    pub(crate) marked_point: Option<(geo::Point<f64>, LayerId)>,
    pub(crate) analysis: Vec<LayerId>,
    base_map: BaseMap,
}

impl<R: MapRenderer> Session<R> {
    /// Creates an empty session drawing into `renderer`.
    pub fn new(mut renderer: R) -> Self {
        let base_map = BaseMap::default();
        renderer.set_base_map(base_map);
        renderer.set_control_visible(Control::RemoveSelected, false);
        renderer.set_control_visible(Control::RemoveSelectedRoad, false);

        Self {
            renderer,
            next_layer: 0,
            layers: BTreeMap::new(),
            armed: BTreeMap::new(),
            slot_a: None,
            slot_b: None,
            boundaries: BTreeMap::new(),
            infrastructure: BTreeMap::new(),
            section: Section::default(),
            tool: ShapefileTool::default(),
            context: ToolContext::default(),
            epoch: 0,
            selection: None,
            road_selection: None,
            point_selection_armed: false,
            marked_point: None,
            analysis: Vec::new(),
            base_map,
        }
    }

    /// The renderer.
    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Active page section.
    pub const fn section(&self) -> Section {
        self.section
    }

    /// Current value of the shapefile tool selector.
    pub const fn tool(&self) -> ShapefileTool {
        self.tool
    }

    /// Active tool context.
    pub const fn context(&self) -> ToolContext {
        self.context
    }

    /// The general selection.
    pub const fn selection(&self) -> Option<FeatureRef> {
        self.selection
    }

    /// The road selection.
    pub const fn road_selection(&self) -> Option<FeatureRef> {
        self.road_selection
    }

    /// Whether background clicks currently mark a point.
    pub const fn is_point_selection_armed(&self) -> bool {
        self.point_selection_armed
    }

    /// The marked point, if any.
    pub fn marked_point(&self) -> Option<geo::Point<f64>> {
        self.marked_point.map(|(point, _)| point)
    }

    /// Layers of the current analysis result set, in the order they were
    /// added.
    pub fn analysis_results(&self) -> &[LayerId] {
        &self.analysis
    }

    /// Contents of an upload slot.
    pub const fn slot(&self, slot: Slot) -> Option<&LoadedLayer> {
        match slot {
            Slot::A => self.slot_a.as_ref(),
            Slot::B => self.slot_b.as_ref(),
        }
    }

    const fn slot_mut(&mut self, slot: Slot) -> &mut Option<LoadedLayer> {
        match slot {
            Slot::A => &mut self.slot_a,
            Slot::B => &mut self.slot_b,
        }
    }

    /// A loaded boundary overlay.
    pub fn boundary(&self, source: DataSource) -> Option<&LoadedLayer> {
        self.boundaries.get(&source)
    }

    /// A loaded infrastructure layer of the current context.
    pub fn infrastructure(&self, source: DataSource) -> Option<&LoadedLayer> {
        self.infrastructure.get(&source)
    }

    /// A layer group known to the session, drawn or hidden.
    pub fn layer(&self, id: LayerId) -> Option<&LayerGroup> {
        self.layers.get(&id)
    }

    /// Groups currently drawn by the renderer.
    pub fn visible_layers(&self) -> impl Iterator<Item = &LayerGroup> {
        self.layers
            .values()
            .filter(|group| self.renderer.has_group(group.id))
    }

    /// The feature behind a reference.
    pub fn feature(&self, target: FeatureRef) -> Option<&Feature> {
        self.layers
            .get(&target.layer)?
            .features
            .get(target.index)
            .map(|rendered| &rendered.feature)
    }

    /// Current background tiles.
    pub const fn base_map(&self) -> BaseMap {
        self.base_map
    }

    /// Switches the background tiles.
    pub fn set_base_map(&mut self, base_map: BaseMap) {
        log::debug!("Base map: {base_map}");
        self.base_map = base_map;
        self.renderer.set_base_map(base_map);
    }

    /// Draws a new group and records it in the registry.
    pub(crate) fn install(
        &mut self,
        label: impl Into<String>,
        pane: Pane,
        style: LayerStyle,
        features: Vec<RenderedFeature>,
    ) -> LayerId {
        self.next_layer += 1;
        let id = LayerId(self.next_layer);
        let group = LayerGroup {
            id,
            label: label.into(),
            pane,
            style,
            features,
        };

        self.renderer.add_group(&group);
        self.layers.insert(id, group);
        id
    }

    /// Removes a group from the map and forgets it. Selections pointing
    /// into it are dropped.
    pub(crate) fn discard(&mut self, id: LayerId) {
        self.drop_selections_on(id);
        self.renderer.remove_group(id);
        self.layers.remove(&id);
        self.armed.remove(&id);
    }

    /// Removes a group from the map but keeps it in the registry so it can
    /// be shown again.
    pub(crate) fn hide(&mut self, id: LayerId) {
        self.drop_selections_on(id);
        self.renderer.remove_group(id);
    }

    /// Draws a registered group again if it was hidden.
    pub(crate) fn show(&mut self, id: LayerId) {
        if self.renderer.has_group(id) {
            return;
        }
        if let Some(group) = self.layers.get(&id) {
            self.renderer.add_group(group);
            if let Some(armed) = self.armed.get(&id) {
                self.renderer.bind_popup(id, &armed.label);
            }
        }
    }

    fn drop_selections_on(&mut self, id: LayerId) {
        if self.selection.is_some_and(|s| s.layer == id) {
            self.clear_selection();
        }
        if self.road_selection.is_some_and(|s| s.layer == id) {
            self.clear_road_selection();
        }
    }

    /// Moves the viewport onto a group, if it has extent.
    pub(crate) fn fit_to(&mut self, id: LayerId) {
        if let Some(bounds) = self.layers.get(&id).and_then(LayerGroup::bounds) {
            self.renderer.fit_bounds(bounds);
        }
    }

    /// Draws any hidden infrastructure layers of the current context again.
    pub(crate) fn show_infrastructure(&mut self) {
        let layers: Vec<LayerId> = self.infrastructure.values().map(|l| l.layer).collect();
        for layer in layers {
            self.show(layer);
        }
    }

    /// Appends a group to the analysis result set and arms it as
    /// selectable under its label.
    pub fn push_analysis_result(
        &mut self,
        label: &str,
        pane: Pane,
        style: LayerStyle,
        features: Vec<RenderedFeature>,
    ) -> LayerId {
        let id = self.install(label, pane, style, features);
        self.analysis.push(id);
        self.arm_selectable(id, label);
        id
    }

    /// Removes every layer of the analysis result set and clears the
    /// general selection.
    pub fn clear_analysis_results(&mut self) {
        for id in std::mem::take(&mut self.analysis) {
            self.discard(id);
        }
        self.clear_selection();
    }

    /// Loads a collection into an upload slot, replacing its previous
    /// content and layer.
    pub fn set_slot(&mut self, slot: Slot, collection: FeatureCollection, name: impl Into<String>) -> LayerId {
        let name = name.into();
        self.clear_slot(slot);

        let style = match slot {
            Slot::A => LayerStyle::SLOT_A,
            Slot::B => LayerStyle::SLOT_B,
        };
        let features = rendered(collection.features(), |_| name.clone());
        let layer = self.install(name.clone(), Pane::Overlay, style, features);
        self.fit_to(layer);
        self.arm_selectable(layer, &name);

        log::info!("Shapefile {slot} loaded: {name} ({} features)", collection.len());
        *self.slot_mut(slot) = Some(LoadedLayer {
            collection: collection.with_source(slot.source()),
            layer,
            name,
        });
        layer
    }

    /// Decodes a zipped shapefile bundle into an upload slot. The display
    /// name is the file name without `.zip`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Provider`] if the bundle cannot be decoded;
    /// the slot is left unchanged.
    pub fn load_shapefile(&mut self, slot: Slot, file_name: &str, bytes: &[u8]) -> Result<LayerId, SessionError> {
        let collection = impact_map_provider::shapefile::decode_zip(bytes, slot.source())?;
        let name = impact_map_provider::shapefile::display_name(file_name);
        Ok(self.set_slot(slot, collection, name))
    }

    /// Empties an upload slot and removes its layer.
    pub fn clear_slot(&mut self, slot: Slot) {
        if let Some(previous) = self.slot_mut(slot).take() {
            self.discard(previous.layer);
        }
    }

    /// Empties both upload slots.
    pub fn clear_all_slots(&mut self) {
        self.clear_slot(Slot::A);
        self.clear_slot(Slot::B);
        self.clear_selection();
    }

    /// Installs an administrative boundary overlay, replacing any previous
    /// one for the same source. Non-area features are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Precondition`] if the collection is not
    /// tagged with a boundary source.
    pub fn set_boundary(&mut self, collection: FeatureCollection) -> Result<LayerId, SessionError> {
        let source = collection.source();
        if !source.is_boundary() {
            return Err(SessionError::precondition(format!(
                "{} is not an administrative boundary layer",
                source.label()
            )));
        }

        let collection = impact_map_provider::envelope::filter_allowed(collection);
        if let Some(previous) = self.boundaries.remove(&source) {
            self.discard(previous.layer);
        }

        let features = rendered(collection.features(), |f| style::boundary_popup(source, f));
        let layer = self.install(source.label(), Pane::Overlay, LayerStyle::boundary(source), features);
        self.arm_selectable(layer, source.label());

        log::info!("{} loaded: {} features", source.label(), collection.len());
        self.boundaries.insert(
            source,
            LoadedLayer {
                collection,
                layer,
                name: source.label().to_string(),
            },
        );
        Ok(layer)
    }

    /// Shows or hides a boundary overlay without touching its data.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Precondition`] for a non-boundary source or
    /// an overlay that has not been loaded.
    pub fn set_overlay_visible(&mut self, source: DataSource, visible: bool) -> Result<(), SessionError> {
        let layer = self
            .boundaries
            .get(&source)
            .filter(|_| source.is_boundary())
            .map(|loaded| loaded.layer)
            .ok_or_else(|| SessionError::precondition(format!("{} overlay is not loaded", source.label())))?;

        if visible {
            self.show(layer);
        } else {
            self.hide(layer);
        }
        Ok(())
    }
}

/// Pairs each feature with its popup text.
pub(crate) fn rendered<'a>(
    features: impl IntoIterator<Item = &'a Feature>,
    popup: impl Fn(&Feature) -> String,
) -> Vec<RenderedFeature> {
    features
        .into_iter()
        .map(|feature| RenderedFeature {
            popup: popup(feature),
            feature: feature.clone(),
        })
        .collect()
}

/// Stroke colour recorded for a group before highlighting.
pub(crate) const fn base_color(style: &LayerStyle) -> &'static str {
    if style.color.is_empty() {
        FALLBACK_COLOR
    } else {
        style.color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MapScene, testing};

    #[test]
    fn set_slot_replaces_previous_layer() {
        let mut session = Session::new(MapScene::new());
        let first = session.set_slot(Slot::A, testing::squares(DataSource::ShapefileA, &[0.0]), "first.zip");
        let second = session.set_slot(Slot::A, testing::squares(DataSource::ShapefileA, &[1.0]), "second");

        assert!(!session.renderer().has_group(first));
        assert!(session.renderer().has_group(second));
        assert_eq!(session.slot(Slot::A).unwrap().name(), "second");
        assert_eq!(session.renderer().group_count(), 1);
    }

    #[test]
    fn slot_popups_use_display_name() {
        let mut session = Session::new(MapScene::new());
        let layer = session.set_slot(Slot::B, testing::squares(DataSource::ShapefileB, &[0.0]), "wards");

        assert_eq!(session.renderer().popup_text(layer, 0), Some("wards"));
        assert_eq!(session.renderer().feature_color(layer, 0), Some("#16a34a"));
    }

    #[test]
    fn invalid_shapefile_leaves_slot_unchanged() {
        let mut session = Session::new(MapScene::new());
        let layer = session.set_slot(Slot::A, testing::squares(DataSource::ShapefileA, &[0.0]), "kept");

        let result = session.load_shapefile(Slot::A, "broken.zip", b"not a zip");

        assert!(matches!(result, Err(SessionError::Provider(_))));
        assert_eq!(session.slot(Slot::A).unwrap().layer(), layer);
        assert!(session.renderer().has_group(layer));
    }

    #[test]
    fn clear_all_slots_removes_both_layers() {
        let mut session = Session::new(MapScene::new());
        session.set_slot(Slot::A, testing::squares(DataSource::ShapefileA, &[0.0]), "a");
        session.set_slot(Slot::B, testing::squares(DataSource::ShapefileB, &[0.0]), "b");

        session.clear_all_slots();

        assert!(session.slot(Slot::A).is_none());
        assert!(session.slot(Slot::B).is_none());
        assert_eq!(session.renderer().group_count(), 0);
    }

    #[test]
    fn overlay_visibility_keeps_collection() {
        let mut session = Session::new(MapScene::new());
        let layer = session
            .set_boundary(testing::squares(DataSource::District, &[0.0, 1.0]))
            .unwrap();

        session.set_overlay_visible(DataSource::District, false).unwrap();
        assert!(!session.renderer().has_group(layer));
        assert_eq!(session.boundary(DataSource::District).unwrap().collection().len(), 2);

        session.set_overlay_visible(DataSource::District, true).unwrap();
        assert!(session.renderer().has_group(layer));
        assert_eq!(session.renderer().popup_text(layer, 1), Some("District"));
    }

    #[test]
    fn boundary_rejects_infrastructure_sources() {
        let mut session = Session::new(MapScene::new());
        let result = session.set_boundary(testing::squares(DataSource::Roads, &[0.0]));
        assert!(matches!(result, Err(SessionError::Precondition(_))));
    }

    #[test]
    fn base_map_is_forwarded() {
        let mut session = Session::new(MapScene::new());
        session.set_base_map(BaseMap::Topographic);
        assert_eq!(session.renderer().base_map(), BaseMap::Topographic);
        assert_eq!(session.base_map(), BaseMap::Topographic);
    }
}
