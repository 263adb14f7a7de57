//! Persisted per-project pipeline state.

use crate::context::ProjectContext;
use crate::core::ProjectStatus;
use crate::errors::SupervisorError;
use crate::utils::Timestamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The resumable state of one project's pipeline.
///
/// Only the supervisor mutates it, and only through
/// [`ProjectState::transition_to`] for status changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    /// The project id.
    pub project_id: String,
    /// Current pipeline status.
    pub status: ProjectStatus,
    /// Accumulated stage payloads.
    #[serde(default)]
    pub context: ProjectContext,
    /// Current correction cycle (0 for the first pass).
    #[serde(default)]
    pub correction_cycle: u32,
    /// Stage most recently started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    /// Run that last touched this project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_run_id: Option<Uuid>,
    /// Set while a run that started from an approved mockup is in flight, so
    /// a crashed run resumes after the pause instead of from the top.
    #[serde(default)]
    pub resume_from_approval: bool,
    /// Payload of the most recent pause, e.g. a mockup preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_payload: Option<HashMap<String, serde_json::Value>>,
    /// When the project was created.
    pub created_at: Timestamp,
    /// When the state was last written.
    pub updated_at: Timestamp,
    /// When the last run reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl ProjectState {
    /// Creates a project in `CREATED` status.
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            project_id: project_id.into(),
            status: ProjectStatus::Created,
            context: ProjectContext::new(),
            correction_cycle: 0,
            current_stage: None,
            pipeline_run_id: None,
            resume_from_approval: false,
            pause_payload: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Seeds the context, typically with the user's project description.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key, value);
        self
    }

    /// Moves to `next` if the transition table allows it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` and leaves the state untouched otherwise.
    pub fn transition_to(&mut self, next: ProjectStatus) -> Result<(), SupervisorError> {
        if !self.status.can_transition_to(next) {
            return Err(SupervisorError::invalid_transition(
                &self.project_id,
                self.status,
                next,
            ));
        }

        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        self.touch();
        Ok(())
    }

    /// Bumps `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
