#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data provider client for the impact map.
//!
//! Fetches administrative boundary and infrastructure layers as `GeoJSON`
//! `FeatureCollection`s from the boundary/infrastructure API, validates
//! the response envelope, and filters features against the per-source
//! geometry allow-list. Also decodes user-uploaded zipped shapefiles into
//! the same [`FeatureCollection`] type.
//!
//! Endpoints are configured by an embedded TOML document
//! ([`config::EndpointConfig`]) that can be overridden from a file or the
//! `IMPACT_MAP_API_URL` environment variable.

pub mod config;
pub mod envelope;
pub mod http;
pub mod shapefile;

use async_trait::async_trait;
use impact_map_layer_models::{DataSource, FeatureCollection};
use thiserror::Error;

pub use http::HttpProvider;

/// Errors that can occur while loading layer data.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider answered with a non-success status.
    #[error("Failed to fetch {layer} data: {status}")]
    Status {
        /// Requested source.
        layer: DataSource,
        /// Status line, e.g. `404 Not Found`.
        status: String,
    },

    /// The body was JSON but not a feature collection.
    #[error("Invalid GeoJSON format for {layer} data: {reason}")]
    InvalidEnvelope {
        /// Requested source.
        layer: DataSource,
        /// What was missing.
        reason: String,
    },

    /// A shapefile bundle could not be decoded.
    #[error("Shapefile error: {message}")]
    Shapefile {
        /// Description of what went wrong.
        message: String,
    },

    /// The upload was not a readable zip archive.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Reading an archive member failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Endpoint configuration is invalid.
    #[error("Config error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// Source of layer data.
///
/// The session drives loads through this trait so workflows can be run
/// against in-memory data as well as the HTTP API.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches and validates one layer.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on transport failure, a non-2xx status,
    /// or a body that is not a `GeoJSON` feature collection.
    async fn fetch(&self, source: DataSource) -> Result<FeatureCollection, ProviderError>;
}
