//! Boundary error type
//!
//! Each crate defines its own `thiserror` enum and converts into this type at
//! the component boundary. Only `Config` is fatal; everything else is
//! recovered at the leader boundary and degrades to fallback or default.

use thiserror::Error;

/// Result alias using the boundary error
pub type Result<T> = std::result::Result<T, Error>;

/// Boundary errors surfaced across crate seams
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed request (gateway maps to 400)
    #[error("Invalid input: {0}")]
    Input(String),

    /// Pool saturated or QPS ceiling hit (gateway maps to 429)
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Per-stage or overall budget expired (gateway maps to 408 only when
    /// nothing at all is available)
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A consumed backend is down; the request degrades within the pipeline
    #[error("Backend unavailable: {component}: {message}")]
    BackendUnavailable { component: String, message: String },

    /// Startup-only; the process exits non-zero
    #[error("Configuration error: {0}")]
    Config(String),

    /// Programming error detected at runtime; response is sanitized best-effort
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// Anything unexpected (gateway maps to 500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a backend-down error
    pub fn backend(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether the error should abort startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_config_is_fatal() {
        assert!(Error::Config("bad".into()).is_fatal());
        assert!(!Error::Timeout("stage".into()).is_fatal());
        assert!(!Error::backend("llm", "down").is_fatal());
    }
}
