//! Menu loop over a [`Session`] drawing into a [`MapScene`].
//!
//! Prompt failures end the loop. Everything else the session or the file
//! system rejects is printed and the menu comes back.

use std::path::PathBuf;

use dialoguer::{Input, Select};
use impact_map_cli_utils::{LoadingSpinner, MultiProgress};
use impact_map_layer_models::{BaseMap, DataSource, Section, ShapefileTool, Slot};
use impact_map_provider::{DataProvider, HttpProvider};
use impact_map_session::{
    EventOutcome, Key, LayerId, LoadProgress, LoadTicket, MapEvent, MapRenderer as _, MapScene, Session,
    SessionError, parse_distance,
};
use strum::IntoEnumIterator as _;

type Error = Box<dyn std::error::Error>;

/// Menu entries. Which ones are offered depends on the active section.
enum Action {
    SwitchSection,
    SelectTool,
    UploadShapefile,
    ClearShapefiles,
    Buffer,
    Intersect,
    Union,
    RoadBuffer,
    ClearRoadSelection,
    MarkLocation,
    StopMarking,
    FindNearestHospital,
    ClickFeature,
    ClickMap,
    RemoveSelected,
    ToggleOverlay,
    ChangeBaseMap,
    ShowState,
    ExportScene,
    Quit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::SwitchSection,
        Self::SelectTool,
        Self::UploadShapefile,
        Self::ClearShapefiles,
        Self::Buffer,
        Self::Intersect,
        Self::Union,
        Self::RoadBuffer,
        Self::ClearRoadSelection,
        Self::MarkLocation,
        Self::StopMarking,
        Self::FindNearestHospital,
        Self::ClickFeature,
        Self::ClickMap,
        Self::RemoveSelected,
        Self::ToggleOverlay,
        Self::ChangeBaseMap,
        Self::ShowState,
        Self::ExportScene,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::SwitchSection => "Switch section",
            Self::SelectTool => "Select shapefile tool",
            Self::UploadShapefile => "Upload shapefile",
            Self::ClearShapefiles => "Clear shapefiles",
            Self::Buffer => "Run buffer",
            Self::Intersect => "Run intersect",
            Self::Union => "Run union",
            Self::RoadBuffer => "Run road buffer",
            Self::ClearRoadSelection => "Remove selected road",
            Self::MarkLocation => "Mark location",
            Self::StopMarking => "Stop marking",
            Self::FindNearestHospital => "Find nearest hospital",
            Self::ClickFeature => "Click a feature",
            Self::ClickMap => "Click the map",
            Self::RemoveSelected => "Remove selected",
            Self::ToggleOverlay => "Toggle boundary overlay",
            Self::ChangeBaseMap => "Change base map",
            Self::ShowState => "Show map state",
            Self::ExportScene => "Export map as GeoJSON",
            Self::Quit => "Quit",
        }
    }

    const fn offered_in(&self, section: Section) -> bool {
        match self {
            Self::SelectTool
            | Self::UploadShapefile
            | Self::ClearShapefiles
            | Self::Buffer
            | Self::Intersect
            | Self::Union => matches!(section, Section::ShapefileAnalysis),
            Self::RoadBuffer | Self::ClearRoadSelection => matches!(section, Section::RoadBuffer),
            Self::MarkLocation | Self::StopMarking | Self::FindNearestHospital => {
                matches!(section, Section::ProximityAnalysis)
            }
            _ => true,
        }
    }
}

/// Loads the boundary overlays, then runs the menu until the user quits.
///
/// # Errors
///
/// Returns an error if a prompt cannot be shown or the boundary overlays
/// cannot be loaded.
pub async fn run(multi: &MultiProgress, provider: &HttpProvider, session: &mut Session<MapScene>) -> Result<(), Error> {
    let spinner = LoadingSpinner::start(multi, "Loading boundaries...");
    match session.load_boundaries(provider).await {
        Ok(()) => spinner.finish("Boundaries loaded"),
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    }

    loop {
        let actions: Vec<&Action> = Action::ALL
            .iter()
            .filter(|action| action.offered_in(session.section()))
            .collect();
        let labels: Vec<&str> = actions.iter().map(|action| action.label()).collect();

        println!();
        let idx = Select::new()
            .with_prompt(format!("[{}] What would you like to do?", session.section()))
            .items(&labels)
            .default(0)
            .interact()?;

        if matches!(actions[idx], Action::Quit) {
            return Ok(());
        }

        if let Err(e) = perform(actions[idx], multi, provider, session).await {
            if e.is::<dialoguer::Error>() {
                return Err(e);
            }
            eprintln!("{e}");
        }
    }
}

#[allow(clippy::too_many_lines)]
async fn perform(
    action: &Action,
    multi: &MultiProgress,
    provider: &HttpProvider,
    session: &mut Session<MapScene>,
) -> Result<(), Error> {
    match action {
        Action::SwitchSection => {
            let sections: Vec<Section> = Section::iter().collect();
            let section = pick(&sections, "Section", session.section())?;
            if let Some(ticket) = session.switch_section(section) {
                load(multi, provider, session, ticket).await?;
            }
        }
        Action::SelectTool => {
            let tools: Vec<ShapefileTool> = ShapefileTool::iter().collect();
            let tool = pick(&tools, "Tool", session.tool())?;
            session.select_tool(tool);
        }
        Action::UploadShapefile => {
            let slot = pick(&[Slot::A, Slot::B], "Slot", Slot::A)?;
            let path: String = Input::new().with_prompt("Path to zipped shapefile").interact_text()?;
            let path = PathBuf::from(path.trim());
            let bytes = std::fs::read(&path)?;
            let file_name = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());

            session.load_shapefile(slot, &file_name, &bytes)?;
            if let Some(loaded) = session.slot(slot) {
                println!("{}: {} ({} features)", slot.source().label(), loaded.name(), loaded.collection().len());
            }
        }
        Action::ClearShapefiles => session.clear_all_slots(),
        Action::Buffer => {
            let km = prompt_distance("Buffer distance (km)")?;
            println!("{}", session.run_buffer(km)?);
        }
        Action::Intersect => println!("{}", session.run_intersect()?),
        Action::Union => println!("{}", session.run_union()?),
        Action::RoadBuffer => {
            let km = prompt_distance("Buffer distance (km)")?;
            println!("{}", session.run_road_buffer(km)?);
        }
        Action::ClearRoadSelection => session.clear_road_selection(),
        Action::MarkLocation => {
            session.arm_point_selection()?;
            println!("Use \"Click the map\" to mark a location.");
        }
        Action::StopMarking => session.disarm_point_selection(),
        Action::FindNearestHospital => {
            let km = prompt_distance("Search radius (km)")?;
            println!("{}", session.run_proximity(km)?);
        }
        Action::ClickFeature => click_feature(session)?,
        Action::ClickMap => {
            let center = session.renderer().viewport().center;
            let lon: f64 = Input::new()
                .with_prompt("Longitude")
                .default(center.x())
                .interact_text()?;
            let lat: f64 = Input::new()
                .with_prompt("Latitude")
                .default(center.y())
                .interact_text()?;

            match session.handle(MapEvent::BackgroundClicked {
                at: geo::Point::new(lon, lat),
            })? {
                EventOutcome::PointMarked(_) => println!("Location marked."),
                _ => println!("Selection cleared."),
            }
        }
        Action::RemoveSelected => match session.handle(MapEvent::KeyPressed(Key::Delete))? {
            EventOutcome::Removed(layer) => println!("Removed {layer}."),
            _ => println!("Nothing is selected."),
        },
        Action::ToggleOverlay => {
            let loaded: Vec<(DataSource, LayerId)> = DataSource::BOUNDARIES
                .into_iter()
                .filter_map(|source| session.boundary(source).map(|b| (source, b.layer())))
                .collect();
            if loaded.is_empty() {
                println!("No boundary overlays are loaded.");
                return Ok(());
            }

            let labels: Vec<String> = loaded
                .iter()
                .map(|(source, layer)| {
                    let state = if session.renderer().has_group(*layer) { "on" } else { "off" };
                    format!("{} [{state}]", source.label())
                })
                .collect();
            let idx = Select::new()
                .with_prompt("Overlay")
                .items(&labels)
                .default(0)
                .interact()?;

            let (source, layer) = loaded[idx];
            let visible = !session.renderer().has_group(layer);
            session.set_overlay_visible(source, visible)?;
        }
        Action::ChangeBaseMap => {
            let maps: Vec<BaseMap> = BaseMap::iter().collect();
            let base_map = pick(&maps, "Base map", session.base_map())?;
            session.set_base_map(base_map);
            println!("Tiles: {}", base_map.tile_url());
        }
        Action::ShowState => show_state(session),
        Action::ExportScene => {
            let path: String = Input::new()
                .with_prompt("Output file")
                .default("impact_map.geojson".to_string())
                .interact_text()?;
            std::fs::write(path.trim(), session.renderer().to_geojson().to_string())?;
            println!("Wrote {}", path.trim());
        }
        Action::Quit => {}
    }

    Ok(())
}

/// Fetches a context's infrastructure behind one spinner. A load that has
/// gone stale stops quietly.
async fn load(
    multi: &MultiProgress,
    provider: &HttpProvider,
    session: &mut Session<MapScene>,
    ticket: LoadTicket,
) -> Result<(), SessionError> {
    let spinner = LoadingSpinner::start(multi, &format!("Loading {} data...", ticket.context()));
    let mut loaded = Vec::new();

    for &source in ticket.sources() {
        spinner.set_message(format!("Loading {}...", source.label()));
        let result = provider.fetch(source).await;

        match session.apply_load(ticket, result) {
            Ok(LoadProgress::Applied { features, .. }) => {
                loaded.push(format!("{features} {}", source.label()));
            }
            Ok(LoadProgress::Stale) => {
                spinner.finish_and_clear();
                return Ok(());
            }
            Err(e) => {
                spinner.finish_and_clear();
                return Err(e);
            }
        }
    }

    spinner.finish(format!("Loaded {}", loaded.join(", ")));
    Ok(())
}

fn click_feature(session: &mut Session<MapScene>) -> Result<(), Error> {
    let groups: Vec<(LayerId, String, Vec<String>)> = session
        .visible_layers()
        .filter(|group| !group.features.is_empty())
        .map(|group| {
            let popups = group.features.iter().map(|f| f.popup.replace('\n', " | ")).collect();
            (group.id, format!("{} ({} features)", group.label, group.features.len()), popups)
        })
        .collect();
    if groups.is_empty() {
        println!("Nothing is drawn.");
        return Ok(());
    }

    let labels: Vec<&str> = groups.iter().map(|(_, label, _)| label.as_str()).collect();
    let group = Select::new()
        .with_prompt("Layer")
        .items(&labels)
        .default(0)
        .max_length(20)
        .interact()?;
    let (layer, _, popups) = &groups[group];

    let index = Select::new()
        .with_prompt("Feature")
        .items(popups)
        .default(0)
        .max_length(20)
        .interact()?;

    let outcome = session.handle(MapEvent::FeatureClicked { layer: *layer, index })?;
    log::debug!("Click on {layer}#{index}: {outcome:?}");
    if let Some(text) = session.renderer().popup_text(*layer, index) {
        println!("{text}");
    }

    Ok(())
}

fn show_state(session: &Session<MapScene>) {
    let scene = session.renderer();
    let viewport = scene.viewport();

    println!("Section:   {}", session.section());
    println!("Tool:      {}", session.context());
    println!("Base map:  {}", session.base_map());
    println!(
        "Viewport:  ({:.4}, {:.4}) zoom {}",
        viewport.center.x(),
        viewport.center.y(),
        viewport.zoom
    );
    if let Some(selected) = session.selection() {
        println!("Selected:  {}#{}", selected.layer, selected.index);
    }
    if let Some(road) = session.road_selection() {
        println!("Road:      {}#{}", road.layer, road.index);
    }
    if let Some(point) = session.marked_point() {
        println!("Marked:    ({:.5}, {:.5})", point.x(), point.y());
    }

    println!();
    for layer in scene.draw_order() {
        let marker = if session.analysis_results().contains(&layer) { "*" } else { " " };
        println!(
            "{marker} {:<10} {:<22} {:>6} features",
            layer.to_string(),
            scene.label(layer).unwrap_or_default(),
            scene.feature_count(layer).unwrap_or_default()
        );
    }
}

fn prompt_distance(prompt: &str) -> Result<f64, dialoguer::Error> {
    let text: String = Input::new().with_prompt(prompt).interact_text()?;
    Ok(parse_distance(&text))
}

fn pick<T: Copy + PartialEq + std::fmt::Display>(items: &[T], prompt: &str, current: T) -> Result<T, dialoguer::Error> {
    let labels: Vec<String> = items.iter().map(ToString::to_string).collect();
    let idx = Select::new()
        .with_prompt(prompt)
        .items(&labels)
        .default(items.iter().position(|item| *item == current).unwrap_or(0))
        .interact()?;
    Ok(items[idx])
}
