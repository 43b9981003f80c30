//! Application state
//!
//! Shared across all handlers. Everything mutable behind this struct is an
//! atomic-swap handle; handlers never block each other.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use podwise_config::Settings;
use podwise_core::EpisodeStore;
use podwise_pipeline::PipelineRunner;
use podwise_recommender::RecommenderHandle;
use podwise_tags::VocabularyHandle;

use crate::health::HealthRegistry;
use crate::rate_limit::RateLimiter;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub runner: Arc<PipelineRunner>,
    pub recommender: Arc<RecommenderHandle>,
    pub episodes: Arc<dyn EpisodeStore>,
    pub vocabulary: Arc<VocabularyHandle>,
    pub rate_limiter: Arc<RateLimiter>,
    pub health: Arc<HealthRegistry>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        runner: Arc<PipelineRunner>,
        recommender: Arc<RecommenderHandle>,
        episodes: Arc<dyn EpisodeStore>,
        vocabulary: Arc<VocabularyHandle>,
        health: HealthRegistry,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(settings.server.qps_ceiling_per_client));
        Self {
            settings: Arc::new(settings),
            runner,
            recommender,
            episodes,
            vocabulary,
            rate_limiter,
            health: Arc::new(health),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
