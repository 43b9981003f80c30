//! Podwise gateway
//!
//! HTTP surface for the answer pipeline:
//! - `POST /query` runs the full retrieval-and-answer flow
//! - `GET /recommendations` serves direct collaborative-filtering results
//! - `GET /health`, `GET /metrics` for operations
//! - `POST /admin/reload-vocabulary` hot-swaps the tag vocabulary

pub mod episodes;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod rate_limit;
pub mod state;

pub use episodes::HttpEpisodeStore;
pub use gateway::create_router;
pub use health::HealthRegistry;
pub use metrics::init_metrics;
pub use rate_limit::RateLimiter;
pub use state::AppState;
