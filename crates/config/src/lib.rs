//! Configuration management for the podcast answer engine
//!
//! Supports loading configuration from:
//! - YAML files (config/default.yaml, config/{env}.yaml)
//! - Environment variables (PODWISE_ prefix, "__" separator)
//!
//! A `ConfigError` at startup is the only fatal error kind in the system;
//! the binary exits non-zero instead of serving with a bad config.

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, EpisodeStoreConfig, GateConfig, LlmBackendConfig, LlmPoolConfig,
    LlmProviderKind, ObservabilityConfig, PipelineConfig, RecommenderConfig, RetrievalConfig,
    RuntimeEnvironment, ServerConfig, Settings, StageBudgets, TagsConfig, WebSearchConfig,
    WorkerThresholds,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
