//! Endpoint configuration for the data provider.
//!
//! The default configuration is embedded at compile time from
//! `endpoints.toml`. A replacement document can be loaded from disk, and
//! the base URL can be overridden from the environment.

use std::path::Path;

use impact_map_layer_models::DataSource;
use serde::{Deserialize, Serialize};

use crate::ProviderError;

/// Environment variable overriding [`EndpointConfig::base_url`].
pub const API_URL_ENV: &str = "IMPACT_MAP_API_URL";

const DEFAULT_ENDPOINTS: &str = include_str!("../endpoints.toml");

/// Base URL plus one relative path per remote data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// API root, e.g. `http://localhost:3000/api`.
    pub base_url: String,
    /// Per-source paths.
    pub paths: EndpointPaths,
}

/// Relative endpoint paths, joined onto the base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPaths {
    /// Local-level boundaries.
    pub local: String,
    /// District boundaries.
    pub district: String,
    /// Province boundaries.
    pub province: String,
    /// Roads.
    pub roads: String,
    /// Buildings.
    pub buildings: String,
    /// Hospitals.
    pub hospitals: String,
}

impl EndpointConfig {
    /// The configuration compiled into the binary.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `endpoints.toml` fails to parse. It is a
    /// compile-time constant, so this indicates a development error and is
    /// caught by the tests below.
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_toml_str(DEFAULT_ENDPOINTS)
            .unwrap_or_else(|e| panic!("Failed to parse embedded endpoints.toml: {e}"))
    }

    /// Parses a TOML endpoint document.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] if the document is malformed.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ProviderError> {
        toml::de::from_str(toml_str).map_err(|e| ProviderError::Config {
            message: e.to_string(),
        })
    }

    /// Reads a TOML endpoint document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ProviderError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Replaces the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Applies the [`API_URL_ENV`] override, if set.
    #[must_use]
    pub fn with_env_override(self) -> Self {
        match std::env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => {
                log::debug!("Using {API_URL_ENV}={url}");
                self.with_base_url(url.trim())
            }
            _ => self,
        }
    }

    /// Full URL for a remote source.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] for upload slots, which have no
    /// endpoint.
    pub fn url_for(&self, source: DataSource) -> Result<String, ProviderError> {
        let path = match source {
            DataSource::Local => &self.paths.local,
            DataSource::District => &self.paths.district,
            DataSource::Province => &self.paths.province,
            DataSource::Roads => &self.paths.roads,
            DataSource::Buildings => &self.paths.buildings,
            DataSource::Hospitals => &self.paths.hospitals,
            DataSource::ShapefileA | DataSource::ShapefileB => {
                return Err(ProviderError::Config {
                    message: format!("{source} is loaded from an upload, not the API"),
                });
            }
        };

        Ok(format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }
}
