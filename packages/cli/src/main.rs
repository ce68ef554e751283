#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interactive terminal front-end for the impact map.
//!
//! Loads the administrative boundaries, then lets the user move between
//! the shapefile, road-corridor and proximity tools, click features, and
//! run analyses against a headless [`MapScene`]. The scene can be exported
//! as `GeoJSON` at any point.
//!
//! Uses `indicatif-log-bridge` (via [`impact_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and spinners never fight for the terminal.

mod interactive;

use std::path::PathBuf;

use clap::Parser;
use impact_map_provider::{HttpProvider, config::EndpointConfig};
use impact_map_session::{MapScene, Session};

#[derive(Parser)]
#[command(name = "impact_map", about = "Interactive geospatial impact analysis")]
struct Cli {
    /// Base URL of the boundary and infrastructure API. Overrides the
    /// endpoint file and the environment.
    #[arg(long)]
    api_url: Option<String>,

    /// TOML file with the API base URL and per-layer paths.
    #[arg(long)]
    endpoints: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let multi = impact_map_cli_utils::init_logger();

    let mut config = match &cli.endpoints {
        Some(path) => EndpointConfig::load(path)?,
        None => EndpointConfig::embedded().with_env_override(),
    };
    if let Some(url) = cli.api_url {
        config = config.with_base_url(url);
    }
    log::info!("Using data API at {}", config.base_url);

    let provider = HttpProvider::new(config);
    let mut session = Session::new(MapScene::new());

    println!("Impact Map");
    println!();

    interactive::run(&multi, &provider, &mut session).await
}
