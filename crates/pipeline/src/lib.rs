//! Pipeline runner
//!
//! Owns the agent arena (leader, experts, workers, shared clients) and
//! sequences the six stages per request:
//! classify -> dispatch -> merge -> augment/compress -> answer -> recommend,
//! with the confidence gate and fallback handling at the end.
//!
//! The runner is the only component that spawns tasks. Each request gets a
//! scope: experts run concurrently inside a `JoinSet`, the whole flow sits
//! under the request budget, and dropping the scope cancels every child.

pub mod runner;

pub use runner::{FallbackReason, PipelineRunner, RunReport, RunnerParts};
