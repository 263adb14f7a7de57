//! Append-only audit records of stage attempts.

use crate::core::{RecordStatus, StageMetrics};
use crate::utils::{generate_uuid, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error log written when a crashed process left a record in flight.
pub const INTERRUPTED_ERROR: &str = "interrupted: the process exited before the stage finished";

/// One stage-invocation attempt.
///
/// Created in `running` status before `execute` is called and finalized
/// exactly once afterwards. `(project_id, pipeline_run_id, stage_name, cycle)`
/// is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Record id.
    pub id: Uuid,
    /// Owning project.
    pub project_id: String,
    /// The `run_pipeline` call that produced this record.
    pub pipeline_run_id: Uuid,
    /// Stage name.
    pub stage_name: String,
    /// Correction cycle of the attempt.
    pub cycle: u32,
    /// `running` until finalized.
    pub status: RecordStatus,
    /// When `execute` was called.
    pub started_at: Timestamp,
    /// When the outcome was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
    /// Measured duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Error text for failed attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_log: Option<String>,
    /// Prompt tokens reported by the stage.
    #[serde(default)]
    pub tokens_in: u64,
    /// Completion tokens reported by the stage.
    #[serde(default)]
    pub tokens_out: u64,
}

impl ExecutionRecord {
    /// Opens a record in `running` status.
    #[must_use]
    pub fn start(
        project_id: impl Into<String>,
        pipeline_run_id: Uuid,
        stage_name: impl Into<String>,
        cycle: u32,
    ) -> Self {
        Self {
            id: generate_uuid(),
            project_id: project_id.into(),
            pipeline_run_id,
            stage_name: stage_name.into(),
            cycle,
            status: RecordStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            error_log: None,
            tokens_in: 0,
            tokens_out: 0,
        }
    }

    /// Returns the finalized copy of this record.
    #[must_use]
    pub fn finalize(
        &self,
        status: RecordStatus,
        metrics: StageMetrics,
        error_log: Option<String>,
    ) -> Self {
        Self {
            status,
            ended_at: Some(Utc::now()),
            duration_ms: Some(metrics.duration_ms),
            error_log,
            tokens_in: metrics.tokens_in,
            tokens_out: metrics.tokens_out,
            ..self.clone()
        }
    }

    /// Returns the copy written for a record a crash left in `running`.
    #[must_use]
    pub fn interrupted(&self) -> Self {
        let ended_at = Utc::now();
        #[allow(clippy::cast_precision_loss)]
        let duration_ms = (ended_at - self.started_at).num_milliseconds().max(0) as f64;
        Self {
            status: RecordStatus::Failed,
            ended_at: Some(ended_at),
            duration_ms: Some(duration_ms),
            error_log: Some(INTERRUPTED_ERROR.to_string()),
            ..self.clone()
        }
    }

    /// Returns true once the record has been finalized.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if `other` describes the same attempt slot.
    #[must_use]
    pub fn same_slot(&self, other: &Self) -> bool {
        self.project_id == other.project_id
            && self.pipeline_run_id == other.pipeline_run_id
            && self.stage_name == other.stage_name
            && self.cycle == other.cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_and_finalize() {
        let run = generate_uuid();
        let record = ExecutionRecord::start("p1", run, "builder", 1);
        assert_eq!(record.status, RecordStatus::Running);
        assert!(!record.is_finalized());

        let done = record.finalize(
            RecordStatus::Completed,
            StageMetrics {
                duration_ms: 12.5,
                tokens_in: 10,
                tokens_out: 20,
            },
            None,
        );

        assert!(done.is_finalized());
        assert_eq!(done.id, record.id);
        assert_eq!(done.duration_ms, Some(12.5));
        assert_eq!(done.tokens_out, 20);
        assert!(done.ended_at.is_some());
        assert!(done.same_slot(&record));
    }

    #[test]
    fn test_interrupted() {
        let record = ExecutionRecord::start("p1", generate_uuid(), "tester", 0);
        let recovered = record.interrupted();

        assert_eq!(recovered.status, RecordStatus::Failed);
        assert_eq!(recovered.error_log.as_deref(), Some(INTERRUPTED_ERROR));
        assert!(recovered.duration_ms.unwrap() >= 0.0);
    }

    #[test]
    fn test_slots_differ_by_run() {
        let a = ExecutionRecord::start("p1", generate_uuid(), "builder", 0);
        let b = ExecutionRecord::start("p1", generate_uuid(), "builder", 0);
        assert!(!a.same_slot(&b));
    }
}
