#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Analysis session for the impact map.
//!
//! [`Session`] is the single owner of everything that is loaded, selected
//! and drawn: the two shapefile upload slots, the administrative boundary
//! overlays, the per-tool infrastructure layers, the general and road
//! selections, the marked point, and the current analysis result set. It
//! drives a [`MapRenderer`] by handing it whole layer groups and never lets
//! the renderer decide what stays on the map.
//!
//! Tool contexts are entered with [`Session::switch_context`], which tears
//! down the previous context's transient state and returns a
//! [`LoadTicket`] when the new context needs data. Loads that come back
//! after the user has moved on are detected through that ticket and
//! dropped.
//!
//! User interaction enters through [`Session::handle`] as [`MapEvent`]s, and
//! the four workflows ([`Session::run_buffer`], [`Session::run_intersect`],
//! [`Session::run_union`], [`Session::run_road_buffer`],
//! [`Session::run_proximity`]) each validate their preconditions, replace
//! the analysis result set, and report a plain-text outcome.

pub mod context;
pub mod events;
pub mod renderer;
pub mod scene;
pub mod selection;
pub mod state;
pub mod style;
pub mod workflows;

#[cfg(test)]
pub(crate) mod testing;

use impact_map_geometry::GeometryError;
use impact_map_provider::ProviderError;
use thiserror::Error;

pub use context::{LoadProgress, LoadTicket};
pub use events::{EventOutcome, Key, MapEvent};
pub use renderer::{Control, LayerGroup, LayerId, MapRenderer, Pane, RenderedFeature};
pub use scene::MapScene;
pub use selection::ClickOutcome;
pub use state::{FeatureRef, LoadedLayer, Session};
pub use workflows::{ImpactReport, NearestHospital, ProximityOutcome, SetOpOutcome, parse_distance};

/// Errors surfaced to the user by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A required input is missing or a user-entered value is invalid.
    /// Nothing was changed.
    #[error("{0}")]
    Precondition(String),

    /// A single-input geometry operation failed, aborting the workflow.
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Loading data failed.
    #[error("Error loading data: {0}")]
    Provider(#[from] ProviderError),

    /// An event referenced a layer or feature that is not on the map.
    #[error("Unknown feature {index} on {layer}")]
    UnknownLayer {
        /// Referenced layer.
        layer: LayerId,
        /// Referenced member index.
        index: usize,
    },
}

impl SessionError {
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }
}
