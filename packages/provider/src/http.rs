//! HTTP implementation of [`DataProvider`].

use async_trait::async_trait;
use impact_map_layer_models::{DataSource, FeatureCollection};

use crate::{DataProvider, ProviderError, config::EndpointConfig, envelope};

/// Fetches layers from the boundary/infrastructure HTTP API.
///
/// Requests carry no timeout: a request that never resolves simply keeps
/// its caller waiting.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: reqwest::Client,
    config: EndpointConfig,
}

impl HttpProvider {
    /// Creates a provider with a fresh client.
    #[must_use]
    pub fn new(config: EndpointConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Creates a provider sharing an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client, config: EndpointConfig) -> Self {
        Self { client, config }
    }

    /// The active endpoint configuration.
    #[must_use]
    pub const fn config(&self) -> &EndpointConfig {
        &self.config
    }
}

#[async_trait]
impl DataProvider for HttpProvider {
    async fn fetch(&self, source: DataSource) -> Result<FeatureCollection, ProviderError> {
        let url = self.config.url_for(source)?;
        log::debug!("Fetching {source} from {url}");

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(ProviderError::Status {
                layer: source,
                status: resp.status().to_string(),
            });
        }
        let body = resp.text().await?;

        let collection = envelope::parse_collection(source, &body)?;
        log::info!("{} loaded: {} features", source.label(), collection.len());

        Ok(collection)
    }
}
