//! Stage result type with factory methods.

use super::StageStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resource metrics reported by a stage.
///
/// `duration_ms` is filled in by the supervisor, which measures the call
/// itself; token counts come from the stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    /// Wall-clock duration of the `execute` call in milliseconds.
    #[serde(default)]
    pub duration_ms: f64,
    /// Prompt tokens consumed.
    #[serde(default)]
    pub tokens_in: u64,
    /// Completion tokens produced.
    #[serde(default)]
    pub tokens_out: u64,
}

impl StageMetrics {
    /// Creates metrics with token counts.
    #[must_use]
    pub fn tokens(tokens_in: u64, tokens_out: u64) -> Self {
        Self {
            duration_ms: 0.0,
            tokens_in,
            tokens_out,
        }
    }
}

/// The result of one stage execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// The outcome of the call.
    pub status: StageStatus,

    /// Keys merged into the project context for later stages.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub payload: HashMap<String, serde_json::Value>,

    /// Duration and token usage.
    #[serde(default)]
    pub metrics: StageMetrics,

    /// Error message (for failed executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for StageResult {
    fn default() -> Self {
        Self::completed_empty()
    }
}

impl StageResult {
    fn with_status(status: StageStatus, payload: HashMap<String, serde_json::Value>) -> Self {
        Self {
            status,
            payload,
            metrics: StageMetrics::default(),
            error: None,
        }
    }

    /// Creates a completed result with a payload.
    #[must_use]
    pub fn completed(payload: HashMap<String, serde_json::Value>) -> Self {
        Self::with_status(StageStatus::Completed, payload)
    }

    /// Creates a completed result with no payload.
    #[must_use]
    pub fn completed_empty() -> Self {
        Self::with_status(StageStatus::Completed, HashMap::new())
    }

    /// Creates a completed result with a single payload value.
    #[must_use]
    pub fn completed_value(key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut payload = HashMap::new();
        payload.insert(key.into(), value);
        Self::completed(payload)
    }

    /// Creates a gate result asking for a correction cycle.
    ///
    /// The payload is the feedback the restart stage should act on.
    #[must_use]
    pub fn rebuild_required(payload: HashMap<String, serde_json::Value>) -> Self {
        Self::with_status(StageStatus::RebuildRequired, payload)
    }

    /// Creates a paused result carrying the artifact awaiting approval.
    #[must_use]
    pub fn paused(payload: HashMap<String, serde_json::Value>) -> Self {
        Self::with_status(StageStatus::Paused, payload)
    }

    /// Creates a failure result with an error message.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::with_status(StageStatus::Failed, HashMap::new())
        }
    }

    /// Sets the metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: StageMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Sets token usage.
    #[must_use]
    pub fn with_tokens(mut self, tokens_in: u64, tokens_out: u64) -> Self {
        self.metrics.tokens_in = tokens_in;
        self.metrics.tokens_out = tokens_out;
        self
    }

    /// Adds a single payload entry.
    #[must_use]
    pub fn with_payload_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Returns true if the result indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the result indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Gets a value from the payload.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.payload.get(key)
    }
}
