//! Values returned by the supervisor entry points.
//!
//! All of them serialize to the JSON the web layer hands to the UI.

use crate::core::{ProjectStatus, RecordStatus};
use crate::errors::SupervisorError;
use crate::state::{ExecutionRecord, ProjectState};
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use uuid::Uuid;

/// Result of one `run_pipeline` call.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// The project id.
    pub project_id: String,
    /// Status the call left the project in.
    pub pipeline_status: ProjectStatus,
    /// Run id shared by every record this call wrote.
    pub stage_runs_ref: Uuid,
    /// Cycle the call ended in.
    pub correction_cycle: u32,
    /// Why the run failed, when it did.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_failure"
    )]
    pub failure: Option<SupervisorError>,
}

fn serialize_failure<S>(failure: &Option<SupervisorError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let dict = failure.as_ref().map(|error| {
        let mut dict = error.to_dict();
        dict.insert("message".to_string(), serde_json::json!(error.to_string()));
        dict
    });
    dict.serialize(serializer)
}

impl RunOutcome {
    /// Returns true if the project completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.pipeline_status == ProjectStatus::Completed
    }

    /// Returns true if the run stopped for human review.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.pipeline_status == ProjectStatus::UxReviewPending
    }
}

/// Whether a resume call changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeStatus {
    /// The pause was approved.
    Resumed,
    /// The project was not awaiting review.
    NoChange,
}

/// Result of `resume_pipeline`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeOutcome {
    /// The project id.
    pub project_id: String,
    /// Whether the call approved a pause.
    pub status: ResumeStatus,
    /// Human-readable explanation.
    pub message: String,
}

/// One execution record as shown to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRunSummary {
    /// Stage name.
    pub stage: String,
    /// Correction cycle of the attempt.
    pub cycle: u32,
    /// Attempt status.
    pub status: RecordStatus,
    /// Run the attempt belongs to.
    pub pipeline_run_id: Uuid,
    /// Start time.
    pub started_at: Timestamp,
    /// End time, absent while running.
    pub ended_at: Option<Timestamp>,
    /// Duration in milliseconds.
    pub duration_ms: Option<f64>,
    /// Error text of failed attempts.
    pub error: Option<String>,
    /// Prompt tokens.
    pub tokens_in: u64,
    /// Completion tokens.
    pub tokens_out: u64,
}

impl From<&ExecutionRecord> for StageRunSummary {
    fn from(record: &ExecutionRecord) -> Self {
        Self {
            stage: record.stage_name.clone(),
            cycle: record.cycle,
            status: record.status,
            pipeline_run_id: record.pipeline_run_id,
            started_at: record.started_at,
            ended_at: record.ended_at,
            duration_ms: record.duration_ms,
            error: record.error_log.clone(),
            tokens_in: record.tokens_in,
            tokens_out: record.tokens_out,
        }
    }
}

/// Read-only projection of a project and its audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// The project id.
    pub project_id: String,
    /// Current status.
    pub project_status: ProjectStatus,
    /// Current correction cycle.
    pub correction_cycle: u32,
    /// Stage most recently started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    /// Payload of the last pause, e.g. the mockup under review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_payload: Option<HashMap<String, serde_json::Value>>,
    /// Every attempt in start order.
    pub stage_runs: Vec<StageRunSummary>,
}

impl StatusReport {
    /// Joins a state with its records.
    #[must_use]
    pub fn new(state: &ProjectState, records: &[ExecutionRecord]) -> Self {
        Self {
            project_id: state.project_id.clone(),
            project_status: state.status,
            correction_cycle: state.correction_cycle,
            current_stage: state.current_stage.clone(),
            pause_payload: state.pause_payload.clone(),
            stage_runs: records.iter().map(StageRunSummary::from).collect(),
        }
    }

    /// Returns the attempts of one stage.
    #[must_use]
    pub fn runs_of(&self, stage: &str) -> Vec<&StageRunSummary> {
        self.stage_runs.iter().filter(|run| run.stage == stage).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageMetrics;
    use crate::utils::generate_uuid;

    #[test]
    fn test_run_outcome_serializes_failure() {
        let outcome = RunOutcome {
            project_id: "p1".to_string(),
            pipeline_status: ProjectStatus::Failed,
            stage_runs_ref: generate_uuid(),
            correction_cycle: 0,
            failure: Some(SupervisorError::StageExecution {
                stage: "schema".to_string(),
                cycle: 0,
                message: "timeout".to_string(),
            }),
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["pipeline_status"], "FAILED");
        assert_eq!(json["failure"]["type"], "StageExecutionError");
        assert_eq!(json["failure"]["stage"], "schema");
        assert!(json["failure"]["message"].as_str().unwrap().contains("timeout"));
    }

    #[test]
    fn test_run_outcome_without_failure() {
        let outcome = RunOutcome {
            project_id: "p1".to_string(),
            pipeline_status: ProjectStatus::Completed,
            stage_runs_ref: generate_uuid(),
            correction_cycle: 0,
            failure: None,
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json.get("failure").is_none());
        assert!(outcome.is_completed());
        assert!(!outcome.is_paused());
    }

    #[test]
    fn test_resume_status_wire_names() {
        assert_eq!(serde_json::to_value(ResumeStatus::NoChange).unwrap(), "no_change");
        assert_eq!(serde_json::to_value(ResumeStatus::Resumed).unwrap(), "resumed");
    }

    #[test]
    fn test_status_report_projection() {
        let mut state = ProjectState::new("p1");
        state.pause_payload = Some(HashMap::from([(
            "preview_url".to_string(),
            serde_json::json!("/mockups/p1.html"),
        )]));

        let run = generate_uuid();
        let records = vec![
            ExecutionRecord::start("p1", run, "planner", 0).finalize(
                RecordStatus::Completed,
                StageMetrics::tokens(5, 7),
                None,
            ),
            ExecutionRecord::start("p1", run, "mockup", 0).finalize(
                RecordStatus::Paused,
                StageMetrics::default(),
                None,
            ),
        ];

        let report = StatusReport::new(&state, &records);
        assert_eq!(report.stage_runs.len(), 2);
        assert_eq!(report.stage_runs[0].tokens_out, 7);
        assert_eq!(report.runs_of("mockup")[0].status, RecordStatus::Paused);
        assert_eq!(
            report.pause_payload.unwrap()["preview_url"],
            serde_json::json!("/mockups/p1.html")
        );
    }
}
