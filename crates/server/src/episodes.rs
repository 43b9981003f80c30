//! HTTP episode store client
//!
//! Thin client for the episode lookup service. Missing ids are omitted by
//! the service; a transport failure surfaces as `BackendUnavailable` and is
//! degraded by the caller.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use podwise_config::EpisodeStoreConfig;
use podwise_core::{Category, Episode, EpisodeStore, Error};

/// Episode lookup over HTTP
pub struct HttpEpisodeStore {
    client: Client,
    endpoint: String,
}

impl HttpEpisodeStore {
    pub fn new(config: &EpisodeStoreConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("episode store client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl EpisodeStore for HttpEpisodeStore {
    async fn get_episodes_by_ids(&self, ids: &[String]) -> Result<Vec<Episode>, Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/episodes", self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("ids", ids.join(","))])
            .send()
            .await
            .map_err(|e| Error::backend("episode_store", e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::backend(
                "episode_store",
                format!("HTTP {}", response.status()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| Error::backend("episode_store", e.to_string()))
    }

    async fn episode_ids_in_category(&self, category: Category) -> Result<Vec<String>, Error> {
        let url = format!("{}/episodes/ids", self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("category", category.as_str())])
            .send()
            .await
            .map_err(|e| Error::backend("episode_store", e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::backend(
                "episode_store",
                format!("HTTP {}", response.status()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| Error::backend("episode_store", e.to_string()))
    }
}
