//! Tool context transitions and data loading.
//!
//! Every context switch bumps an epoch and hands out a [`LoadTicket`] for
//! the data the new context needs. Fetch results are applied through
//! [`Session::apply_load`], which drops anything carrying a ticket from an
//! earlier epoch. A load that finishes after the user has switched away
//! therefore never touches the new context's state, even though the fetch
//! itself cannot be cancelled.

use impact_map_layer_models::{
    DataSource, Feature, FeatureCollection, GeometryFamily, Section, ShapefileTool, ToolContext,
};
use impact_map_provider::{DataProvider, ProviderError};

use crate::{
    SessionError,
    renderer::{MapRenderer, Pane},
    state::{LoadedLayer, Session, rendered},
    style::{self, LayerStyle},
};

/// Authorises applying data fetched for one context entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    context: ToolContext,
    epoch: u64,
}

impl LoadTicket {
    /// Context the load was started for.
    #[must_use]
    pub const fn context(self) -> ToolContext {
        self.context
    }

    /// Sources to fetch, in order.
    #[must_use]
    pub const fn sources(self) -> &'static [DataSource] {
        self.context.entry_sources()
    }
}

/// Result of applying one fetched layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadProgress {
    /// The layer was installed.
    Applied {
        /// Source that was installed.
        source: DataSource,
        /// Features kept after filtering.
        features: usize,
    },
    /// The ticket belongs to a context that has since been left.
    Stale,
}

impl<R: MapRenderer> Session<R> {
    /// Activates a page section and enters its tool context.
    pub fn switch_section(&mut self, section: Section) -> Option<LoadTicket> {
        self.section = section;
        self.switch_context(section.context(self.tool))
    }

    /// Changes the shapefile tool selector. Clears the general selection,
    /// and switches context when the shapefile analysis section is active.
    pub fn select_tool(&mut self, tool: ShapefileTool) {
        self.tool = tool;
        self.clear_selection();
        if self.section == Section::ShapefileAnalysis {
            let ticket = self.switch_context(tool.context());
            debug_assert!(ticket.is_none(), "shapefile tools load nothing on entry");
        }
    }

    /// Tears down the current context's transient state and enters
    /// `context`. Teardown runs even when `context` is already active.
    ///
    /// Returns a ticket when the new context needs data; feed it to
    /// [`Session::run_load`] or fetch and [`Session::apply_load`] manually.
    pub fn switch_context(&mut self, context: ToolContext) -> Option<LoadTicket> {
        self.teardown();
        self.context = context;
        self.epoch += 1;
        log::debug!("Entered {context} context (epoch {})", self.epoch);

        (!context.entry_sources().is_empty()).then_some(LoadTicket {
            context,
            epoch: self.epoch,
        })
    }

    fn teardown(&mut self) {
        self.clear_selection();
        self.clear_road_selection();
        self.point_selection_armed = false;
        if let Some((_, layer)) = self.marked_point.take() {
            self.discard(layer);
        }
        self.clear_analysis_results();
        for loaded in std::mem::take(&mut self.infrastructure).into_values() {
            self.discard(loaded.layer);
        }
    }

    /// Whether a ticket still belongs to the active context entry.
    #[must_use]
    pub const fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.epoch == self.epoch
    }

    /// Applies one fetch result for `ticket`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Provider`] if the fetch failed and
    /// [`SessionError::Precondition`] if the collection's source is not
    /// part of the ticket's context. A stale ticket is never an error.
    pub fn apply_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<FeatureCollection, ProviderError>,
    ) -> Result<LoadProgress, SessionError> {
        if !self.is_current(ticket) {
            log::info!("Discarding {} data loaded for a context that is no longer active", ticket.context);
            return Ok(LoadProgress::Stale);
        }

        let collection = result?;
        let source = collection.source();
        if !ticket.sources().contains(&source) {
            return Err(SessionError::precondition(format!(
                "{} data is not used by the {} tool",
                source.label(),
                ticket.context
            )));
        }

        let features = self.install_infrastructure(collection);
        Ok(LoadProgress::Applied { source, features })
    }

    /// Fetches and applies every source of `ticket` in order. Stops at the
    /// first failure, keeping the layers already applied, and stops quietly
    /// if the ticket goes stale. Returns the number of layers applied.
    ///
    /// # Errors
    ///
    /// Returns the first fetch or apply error.
    pub async fn run_load<P: DataProvider + ?Sized>(
        &mut self,
        ticket: LoadTicket,
        provider: &P,
    ) -> Result<usize, SessionError> {
        let mut applied = 0;
        for &source in ticket.sources() {
            let result = provider.fetch(source).await;
            match self.apply_load(ticket, result)? {
                LoadProgress::Applied { .. } => applied += 1,
                LoadProgress::Stale => break,
            }
        }
        Ok(applied)
    }

    /// Loads the local, district and province overlays in that order, then
    /// fits the viewport to the first non-empty one.
    ///
    /// # Errors
    ///
    /// Returns the first fetch error; overlays loaded before it are kept
    /// and the viewport is left alone.
    pub async fn load_boundaries<P: DataProvider + ?Sized>(&mut self, provider: &P) -> Result<(), SessionError> {
        for source in DataSource::BOUNDARIES {
            let collection = provider.fetch(source).await?;
            self.set_boundary(collection)?;
        }
        self.clear_selection();

        let first = DataSource::BOUNDARIES
            .iter()
            .filter_map(|source| self.boundaries.get(source))
            .find(|loaded| !loaded.collection.is_empty())
            .map(|loaded| loaded.layer);
        if let Some(layer) = first {
            self.fit_to(layer);
        }
        Ok(())
    }

    fn install_infrastructure(&mut self, collection: FeatureCollection) -> usize {
        let collection = impact_map_provider::envelope::filter_allowed(collection);
        let source = collection.source();
        if let Some(previous) = self.infrastructure.remove(&source) {
            self.discard(previous.layer);
        }

        let collection = if self.context == ToolContext::Proximity && source == DataSource::Buildings {
            let (kept, dropped) = collection.retain_families(&[GeometryFamily::Point]);
            if dropped > 0 {
                log::warn!("Dropped {dropped} building features without point geometry");
            }
            if kept.is_empty() {
                log::warn!("No valid building features after filtering");
            }
            kept
        } else {
            collection
        };

        let (layer_style, popup): (LayerStyle, fn(&Feature) -> String) = match source {
            DataSource::Roads => (LayerStyle::ROADS, style::road_popup),
            DataSource::Buildings if self.context == ToolContext::Proximity => {
                (LayerStyle::PROXIMITY_BUILDINGS, style::building_popup)
            }
            DataSource::Buildings => (LayerStyle::CORRIDOR_BUILDINGS, style::building_popup),
            _ => (LayerStyle::HOSPITALS, style::hospital_popup),
        };

        let features = rendered(collection.features(), popup);
        let layer = self.install(format!("{}s", source.label()), Pane::Overlay, layer_style, features);
        let count = collection.len();
        log::info!("{} loaded: {count} features", source.label());

        self.infrastructure.insert(
            source,
            LoadedLayer {
                collection,
                layer,
                name: source.label().to_string(),
            },
        );

        match (self.context, source) {
            (ToolContext::RoadBuffer, DataSource::Roads) => self.fit_to(layer),
            (ToolContext::Proximity, DataSource::Buildings) => self.arm_selectable(layer, "Building"),
            (ToolContext::Proximity, DataSource::Hospitals) => {
                self.arm_selectable(layer, "Hospital");
                self.fit_to_proximity_data();
            }
            _ => {}
        }

        count
    }

    fn fit_to_proximity_data(&mut self) {
        let target = [DataSource::Buildings, DataSource::Hospitals]
            .iter()
            .filter_map(|source| self.infrastructure.get(source))
            .find(|loaded| !loaded.collection.is_empty())
            .map(|loaded| loaded.layer);
        if let Some(layer) = target {
            self.fit_to(layer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MapScene, testing};

    #[tokio::test]
    async fn road_buffer_entry_loads_three_layers_in_order() {
        let provider = testing::corridor_provider();
        let mut session = Session::new(MapScene::new());

        let ticket = session.switch_section(Section::RoadBuffer).unwrap();
        assert_eq!(ticket.context(), ToolContext::RoadBuffer);
        assert_eq!(session.run_load(ticket, &provider).await.unwrap(), 3);

        assert_eq!(session.renderer().labels(), vec!["Roads", "Buildings", "Hospitals"]);
        assert_eq!(
            provider.requests(),
            vec![DataSource::Roads, DataSource::Buildings, DataSource::Hospitals]
        );
    }

    #[tokio::test]
    async fn failed_fetch_keeps_earlier_layers() {
        let provider = testing::corridor_provider().failing(DataSource::Buildings);
        let mut session = Session::new(MapScene::new());

        let ticket = session.switch_section(Section::RoadBuffer).unwrap();
        let result = session.run_load(ticket, &provider).await;

        assert!(matches!(result, Err(SessionError::Provider(_))));
        assert!(session.infrastructure(DataSource::Roads).is_some());
        assert!(session.infrastructure(DataSource::Buildings).is_none());
        assert!(session.infrastructure(DataSource::Hospitals).is_none());
    }

    #[tokio::test]
    async fn switching_twice_matches_switching_once() {
        let provider = testing::corridor_provider();
        let mut once = Session::new(MapScene::new());
        let mut twice = Session::new(MapScene::new());

        let ticket = once.switch_section(Section::RoadBuffer).unwrap();
        once.run_load(ticket, &provider).await.unwrap();

        for _ in 0..2 {
            let ticket = twice.switch_section(Section::RoadBuffer).unwrap();
            twice.run_load(ticket, &provider).await.unwrap();
        }

        assert_eq!(once.renderer().labels(), twice.renderer().labels());
        assert_eq!(once.context(), twice.context());
        assert_eq!(twice.selection(), None);
        assert!(twice.analysis_results().is_empty());
    }

    #[tokio::test]
    async fn stale_ticket_is_ignored() {
        let provider = testing::corridor_provider();
        let mut session = Session::new(MapScene::new());

        let ticket = session.switch_section(Section::RoadBuffer).unwrap();
        let roads = provider.fetch(DataSource::Roads).await;
        assert!(session.switch_section(Section::ShapefileAnalysis).is_none());

        assert_eq!(session.apply_load(ticket, roads).unwrap(), LoadProgress::Stale);
        assert!(session.infrastructure(DataSource::Roads).is_none());
        assert_eq!(session.renderer().group_count(), 0);
    }

    #[tokio::test]
    async fn stale_failure_is_not_reported() {
        let mut session = Session::new(MapScene::new());
        let ticket = session.switch_section(Section::ProximityAnalysis).unwrap();
        let _ = session.switch_section(Section::ProximityAnalysis);

        let failed = Err(ProviderError::Config {
            message: "unreachable".to_string(),
        });
        assert_eq!(session.apply_load(ticket, failed).unwrap(), LoadProgress::Stale);
    }

    #[tokio::test]
    async fn leaving_context_discards_infrastructure() {
        let provider = testing::corridor_provider();
        let mut session = Session::new(MapScene::new());

        let ticket = session.switch_section(Section::RoadBuffer).unwrap();
        session.run_load(ticket, &provider).await.unwrap();
        session.switch_section(Section::ShapefileAnalysis);

        assert!(session.infrastructure(DataSource::Roads).is_none());
        assert_eq!(session.renderer().group_count(), 0);
    }

    #[tokio::test]
    async fn proximity_entry_keeps_only_point_buildings() {
        let provider = testing::proximity_provider();
        let mut session = Session::new(MapScene::new());

        let ticket = session.switch_section(Section::ProximityAnalysis).unwrap();
        session.run_load(ticket, &provider).await.unwrap();

        let buildings = session.infrastructure(DataSource::Buildings).unwrap();
        assert!(
            buildings
                .collection()
                .features()
                .iter()
                .all(|f| f.family() == GeometryFamily::Point)
        );
        assert_eq!(buildings.collection().len(), 2);
        assert_eq!(session.renderer().popup_text(buildings.layer(), 0), Some("Building"));
    }

    #[tokio::test]
    async fn boundaries_load_in_order_and_fit_first_non_empty() {
        let provider = testing::boundary_provider();
        let mut session = Session::new(MapScene::new());

        session.load_boundaries(&provider).await.unwrap();

        assert_eq!(session.renderer().labels(), vec!["Local Level", "District", "Province"]);
        let district = session.boundary(DataSource::District).unwrap();
        let expected = session.layer(district.layer()).unwrap().bounds();
        assert_eq!(session.renderer().viewport().bounds, expected);
    }

    #[tokio::test]
    async fn boundary_failure_keeps_earlier_overlays() {
        let provider = testing::boundary_provider().failing(DataSource::Province);
        let mut session = Session::new(MapScene::new());

        assert!(session.load_boundaries(&provider).await.is_err());
        assert!(session.boundary(DataSource::Local).is_some());
        assert!(session.boundary(DataSource::District).is_some());
        assert!(session.boundary(DataSource::Province).is_none());
        assert_eq!(session.renderer().viewport().bounds, None);
    }

    #[test]
    fn select_tool_switches_context_in_shapefile_section() {
        let mut session = Session::new(MapScene::new());
        session.select_tool(ShapefileTool::Union);
        assert_eq!(session.context(), ToolContext::Union);

        let _ = session.switch_section(Section::ProximityAnalysis);
        session.select_tool(ShapefileTool::Buffer);
        assert_eq!(session.context(), ToolContext::Proximity);
        assert_eq!(session.tool(), ShapefileTool::Buffer);
    }
}
