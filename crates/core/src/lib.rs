//! Core traits and types for the podcast answer engine
//!
//! This crate provides foundational types used across all other crates:
//! - Domain types (Query, Candidate, Episode, Response, Trace)
//! - Category taxonomy shared by the tag vocabulary and the experts
//! - Dependency traits for pluggable backends (embedding, vector index,
//!   episode lookup, web search)
//! - Error types with the boundary kinds surfaced by the gateway

pub mod candidate;
pub mod category;
pub mod episode;
pub mod error;
pub mod interaction;
pub mod query;
pub mod response;
pub mod trace;
pub mod traits;

pub use candidate::Candidate;
pub use category::Category;
pub use episode::Episode;
pub use error::{Error, Result};
pub use interaction::{InteractionAction, InteractionRow};
pub use query::{CategoryDecision, Query};
pub use response::{Response, ResponseSource, DEFAULT_APOLOGY};
pub use trace::{Trace, TraceEntry};
pub use traits::{
    ChunkFilter, ChunkHit, Embedder, EpisodeStore, VectorIndex, WebSearchHit, WebSearchProvider,
    WebSearchResponse,
};
