//! Pipeline event type.

use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};

/// Event type names emitted by the supervisor.
pub mod event_types {
    /// A `run_pipeline` call started.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A stage is about to execute.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage completed.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage failed or raised.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// A stage was skipped during a correction cycle.
    pub const STAGE_SKIPPED: &str = "stage.skipped";
    /// A gate asked for a rebuild.
    pub const GATE_REBUILD_REQUIRED: &str = "gate.rebuild_required";
    /// A correction cycle began.
    pub const CORRECTION_STARTED: &str = "correction.started";
    /// The pipeline paused for review.
    pub const PIPELINE_PAUSED: &str = "pipeline.paused";
    /// A paused pipeline was approved.
    pub const PIPELINE_RESUMED: &str = "pipeline.resumed";
    /// The pipeline reached `COMPLETED`.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// The pipeline reached `FAILED`.
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
}

/// One progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Event type, one of [`event_types`].
    pub event_type: String,
    /// The project the event belongs to.
    pub project_id: String,
    /// The stage involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Correction cycle at the time of the event.
    pub cycle: u32,
    /// Additional event data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// When the event was created.
    pub timestamp: Timestamp,
}

impl PipelineEvent {
    /// Creates a project-level event.
    #[must_use]
    pub fn new(event_type: &str, project_id: impl Into<String>, cycle: u32) -> Self {
        Self {
            event_type: event_type.to_string(),
            project_id: project_id.into(),
            stage: None,
            cycle,
            data: None,
            timestamp: now_utc(),
        }
    }

    /// Sets the stage.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Sets the data.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_skips_empty_fields() {
        let event = PipelineEvent::new(event_types::PIPELINE_STARTED, "p1", 0);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event_type"], "pipeline.started");
        assert!(json.get("stage").is_none());
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_stage_event() {
        let event = PipelineEvent::new(event_types::STAGE_FAILED, "p1", 2)
            .with_stage("tester")
            .with_data(serde_json::json!({"error": "boom"}));

        assert_eq!(event.stage.as_deref(), Some("tester"));
        assert_eq!(event.cycle, 2);
        assert_eq!(event.data.unwrap()["error"], "boom");
    }
}
