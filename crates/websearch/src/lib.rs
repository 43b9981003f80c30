//! Web-search fallback
//!
//! Features:
//! - SearxNG-style JSON provider over HTTP
//! - Snippet-derived summary and confidence heuristic
//! - TTL cache on (query, lang), swallowing provider errors into an empty
//!   zero-confidence response
//!
//! This path is only entered when internal evidence is weak; it must never
//! make a bad request worse, so nothing here returns an error.

pub mod cache;
pub mod provider;

pub use cache::CachingSearchProvider;
pub use provider::{HttpSearchProvider, SearchProviderConfig};
