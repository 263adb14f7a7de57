//! Error types for the pipeline supervisor.
//!
//! `SupervisorError` is the taxonomy surfaced to callers. Stage code sits
//! behind `anyhow` at its boundary; everything the supervisor itself returns
//! is one of the typed errors below.

use crate::core::ProjectStatus;
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for supervisor operations.
#[derive(Debug, Clone, Error)]
pub enum SupervisorError {
    /// No project with this id exists in the store.
    #[error("Project not found: {project_id}")]
    NotFound {
        /// The requested project id.
        project_id: String,
    },

    /// A stage raised or returned `failed`.
    #[error("Stage '{stage}' failed in cycle {cycle}: {message}")]
    StageExecution {
        /// The failing stage.
        stage: String,
        /// The correction cycle it ran in.
        cycle: u32,
        /// The error text recorded on the execution record.
        message: String,
    },

    /// A gate asked for a correction cycle.
    #[error("Gate '{stage}' requested a rebuild in cycle {cycle}")]
    GateFailure {
        /// The gate stage.
        stage: String,
        /// The cycle in which it failed.
        cycle: u32,
    },

    /// Gates kept failing until the correction budget ran out.
    #[error("Correction budget exhausted after {cycles} cycle(s); failing gates: {}", .gates.join(", "))]
    CorrectionBudgetExhausted {
        /// Number of cycles executed.
        cycles: u32,
        /// Gates that failed in the last cycle.
        gates: Vec<String>,
    },

    /// The requested status change is not allowed from the current status.
    #[error("Invalid transition for project {project_id}: {from} -> {to}")]
    InvalidTransition {
        /// The project id.
        project_id: String,
        /// Current status.
        from: ProjectStatus,
        /// Requested status.
        to: ProjectStatus,
    },

    /// The persistence port failed.
    #[error("{0}")]
    Persistence(#[from] PersistenceError),

    /// The stage registry is malformed.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// The supervisor configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SupervisorError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(project_id: impl Into<String>) -> Self {
        Self::NotFound {
            project_id: project_id.into(),
        }
    }

    /// Creates an invalid transition error.
    #[must_use]
    pub fn invalid_transition(
        project_id: impl Into<String>,
        from: ProjectStatus,
        to: ProjectStatus,
    ) -> Self {
        Self::InvalidTransition {
            project_id: project_id.into(),
            from,
            to,
        }
    }

    /// Returns the stable type name used in serialized outcomes.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::StageExecution { .. } => "StageExecutionError",
            Self::GateFailure { .. } => "GateFailure",
            Self::CorrectionBudgetExhausted { .. } => "CorrectionBudgetExhausted",
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::Persistence(_) => "PersistenceError",
            Self::Registry(_) => "RegistryError",
            Self::Config(_) => "ConfigError",
        }
    }

    /// Returns true if the caller may retry the same call later.
    ///
    /// Only stage failures and storage hiccups qualify; the supervisor never
    /// retries them itself.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StageExecution { .. } | Self::Persistence(_))
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));

        match self {
            Self::NotFound { project_id } => {
                map.insert("project_id".to_string(), serde_json::json!(project_id));
            }
            Self::StageExecution { stage, cycle, .. } | Self::GateFailure { stage, cycle } => {
                map.insert("stage".to_string(), serde_json::json!(stage));
                map.insert("cycle".to_string(), serde_json::json!(cycle));
            }
            Self::CorrectionBudgetExhausted { cycles, gates } => {
                map.insert("cycles".to_string(), serde_json::json!(cycles));
                map.insert("gates".to_string(), serde_json::json!(gates));
            }
            Self::InvalidTransition { project_id, from, to } => {
                map.insert("project_id".to_string(), serde_json::json!(project_id));
                map.insert("from".to_string(), serde_json::json!(from.to_string()));
                map.insert("to".to_string(), serde_json::json!(to.to_string()));
            }
            Self::Persistence(_) | Self::Registry(_) | Self::Config(_) => {}
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Errors raised by persistence adapters.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    /// A write collided with existing data.
    #[error("Persistence conflict: {0}")]
    Conflict(String),

    /// The project has never been created.
    #[error("Project not found in store: {0}")]
    ProjectNotFound(String),

    /// An execution record id is unknown.
    #[error("Execution record not found: {0}")]
    RecordNotFound(String),

    /// Underlying I/O failed.
    #[error("Persistence I/O error: {0}")]
    Io(String),

    /// A stored document could not be encoded or decoded.
    #[error("Persistence serialization error: {0}")]
    Serialization(String),

    /// Any other backend failure.
    #[error("Persistence backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error raised when a stage registry fails validation.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct RegistryError {
    /// Stable error code (e.g., "REGISTRY-DUPLICATE").
    pub code: &'static str,
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl RegistryError {
    /// Creates a new registry error.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}
