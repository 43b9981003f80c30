//! Per-request trace
//!
//! Append-only audit record listing every stage entered, its elapsed time,
//! sizes, score movement, and any timeout or fallback reason. Used by tests
//! and telemetry; never returned to end users.

use serde::{Deserialize, Serialize};

/// One stage record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Stage name ("classify", "expert:business", "rerank", ...)
    pub stage: String,
    pub elapsed_ms: u64,
    pub input_size: usize,
    pub output_size: usize,
    /// Per-candidate hybrid-score delta, keyed by chunk id
    #[serde(default)]
    pub score_deltas: Vec<(String, f32)>,
    /// Chunk ids dropped at this stage
    #[serde(default)]
    pub dropped: Vec<String>,
    #[serde(default)]
    pub timed_out: bool,
    /// Timeout/fallback reason or other annotation
    #[serde(default)]
    pub note: Option<String>,
}

impl TraceEntry {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            elapsed_ms: 0,
            input_size: 0,
            output_size: 0,
            score_deltas: Vec::new(),
            dropped: Vec::new(),
            timed_out: false,
            note: None,
        }
    }

    pub fn sized(mut self, input: usize, output: usize) -> Self {
        self.input_size = input;
        self.output_size = output;
        self
    }

    pub fn elapsed(mut self, ms: u64) -> Self {
        self.elapsed_ms = ms;
        self
    }

    pub fn timed_out(mut self) -> Self {
        self.timed_out = true;
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Single-writer, per-request trace buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: String,
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// First entry for the named stage, if it ran
    pub fn stage(&self, name: &str) -> Option<&TraceEntry> {
        self.entries.iter().find(|e| e.stage == name)
    }

    /// Whether any stage recorded a timeout
    pub fn any_timeout(&self) -> bool {
        self.entries.iter().any(|e| e.timed_out)
    }

    /// Absorb entries produced by a child scope (an expert run)
    pub fn absorb(&mut self, entries: Vec<TraceEntry>) {
        self.entries.extend(entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_lookup() {
        let mut trace = Trace::new("t1");
        trace.record(TraceEntry::new("classify").sized(1, 1).elapsed(3));
        trace.record(TraceEntry::new("rerank").timed_out());

        assert_eq!(trace.entries().len(), 2);
        assert!(trace.stage("classify").is_some());
        assert!(trace.any_timeout());
        assert!(trace.stage("rerank").unwrap().timed_out);
    }
}
