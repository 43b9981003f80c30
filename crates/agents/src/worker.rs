//! Shared worker interface
//!
//! Every worker exposes one typed operation plus a cheap timeout fallback.
//! `run_with_budget` enforces the wall-clock budget: a worker that overruns
//! is cancelled and its fallback output is returned with `timed_out = true`,
//! never a silent failure.

use async_trait::async_trait;
use std::time::Duration;

use podwise_core::TraceEntry;

use crate::AgentError;

/// Result of one budgeted worker run
#[derive(Debug, Clone)]
pub struct WorkerOutcome<T> {
    pub output: T,
    /// Worker self-confidence in [0,1]
    pub confidence: f32,
    pub timed_out: bool,
    pub trace: TraceEntry,
}

impl<T> WorkerOutcome<T> {
    /// Whether the worker cleared its configured confidence threshold
    pub fn clears(&self, threshold: f32) -> bool {
        !self.timed_out && self.confidence >= threshold
    }
}

/// One stateless single-task executor
#[async_trait]
pub trait Worker: Send + Sync {
    type Input: Send + Clone;
    type Output: Send;

    /// Stage name recorded in traces
    fn name(&self) -> &'static str;

    /// Execute the operation, returning output and self-confidence
    async fn execute(&self, input: Self::Input) -> Result<(Self::Output, f32), AgentError>;

    /// Cheap partial output used when the budget expires
    fn on_timeout(&self, input: Self::Input) -> Self::Output;

    /// Trace size of an input (candidate counts, text length, ...)
    fn input_size(&self, input: &Self::Input) -> usize {
        let _ = input;
        1
    }

    /// Trace size of an output
    fn output_size(&self, output: &Self::Output) -> usize {
        let _ = output;
        1
    }
}

/// Run a worker under its stage budget
pub async fn run_with_budget<W: Worker>(
    worker: &W,
    input: W::Input,
    budget: Duration,
) -> Result<WorkerOutcome<W::Output>, AgentError> {
    let started = std::time::Instant::now();
    let input_size = worker.input_size(&input);
    let fallback_input = input.clone();

    match tokio::time::timeout(budget, worker.execute(input)).await {
        Ok(Ok((output, confidence))) => {
            let trace = TraceEntry::new(worker.name())
                .sized(input_size, worker.output_size(&output))
                .elapsed(started.elapsed().as_millis() as u64);
            Ok(WorkerOutcome {
                output,
                confidence,
                timed_out: false,
                trace,
            })
        }
        Ok(Err(e)) => Err(e),
        Err(_) => {
            tracing::warn!(
                worker = worker.name(),
                budget_ms = budget.as_millis() as u64,
                "Worker exceeded budget, returning partial output"
            );
            let output = worker.on_timeout(fallback_input);
            let trace = TraceEntry::new(worker.name())
                .sized(input_size, worker.output_size(&output))
                .elapsed(budget.as_millis() as u64)
                .timed_out()
                .note("budget expired");
            Ok(WorkerOutcome {
                output,
                confidence: 0.0,
                timed_out: true,
                trace,
            })
        }
    }
}
