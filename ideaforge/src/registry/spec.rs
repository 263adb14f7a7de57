//! Stage specifications and role metadata.

use crate::errors::RegistryError;
use crate::stages::Stage;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

#[allow(clippy::expect_used)]
fn stage_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_-]*$").expect("static regex is valid"))
}

/// Declarative roles the supervisor consults instead of stage names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageRoles {
    /// A `paused` outcome suspends the pipeline for human review.
    #[serde(default)]
    pub is_pause_point: bool,
    /// A `rebuild_required` outcome triggers a correction cycle.
    #[serde(default)]
    pub is_gate: bool,
    /// Correction cycles and approved resumes restart here.
    #[serde(default)]
    pub is_restart_target: bool,
    /// Not executed during correction cycles.
    #[serde(default)]
    pub skip_on_correction: bool,
}

impl StageRoles {
    /// Roles of a plain work stage.
    #[must_use]
    pub fn work() -> Self {
        Self::default()
    }

    /// Roles of a pause stage.
    #[must_use]
    pub fn pause_point() -> Self {
        Self {
            is_pause_point: true,
            ..Self::default()
        }
    }

    /// Roles of a gate stage.
    #[must_use]
    pub fn gate() -> Self {
        Self {
            is_gate: true,
            ..Self::default()
        }
    }

    /// Roles of the restart target.
    #[must_use]
    pub fn restart_target() -> Self {
        Self {
            is_restart_target: true,
            ..Self::default()
        }
    }

    /// Roles of a stage skipped during correction cycles.
    #[must_use]
    pub fn skip_on_correction() -> Self {
        Self {
            skip_on_correction: true,
            ..Self::default()
        }
    }
}

/// Specification for a single stage in a pipeline.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// Human-readable description shown in status views.
    pub description: String,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
    /// Role metadata.
    pub roles: StageRoles,
}

impl StageSpec {
    /// Creates a new work stage specification.
    #[must_use]
    pub fn new(name: impl Into<String>, runner: Arc<dyn Stage>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            runner,
            roles: StageRoles::default(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replaces the role metadata.
    #[must_use]
    pub fn with_roles(mut self, roles: StageRoles) -> Self {
        self.roles = roles;
        self
    }

    /// Marks the stage as a pause point.
    #[must_use]
    pub fn pause_point(mut self) -> Self {
        self.roles.is_pause_point = true;
        self
    }

    /// Marks the stage as a gate.
    #[must_use]
    pub fn gate(mut self) -> Self {
        self.roles.is_gate = true;
        self
    }

    /// Marks the stage as the correction restart target.
    #[must_use]
    pub fn restart_target(mut self) -> Self {
        self.roles.is_restart_target = true;
        self
    }

    /// Marks the stage as skipped during correction cycles.
    #[must_use]
    pub fn skip_on_correction(mut self) -> Self {
        self.roles.skip_on_correction = true;
        self
    }

    /// Validates the stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a lowercase identifier or if the
    /// runner reports a different name.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if !stage_name_pattern().is_match(&self.name) {
            return Err(RegistryError::new(
                "REGISTRY-NAME",
                format!(
                    "Stage name '{}' must start with a lowercase letter and contain only [a-z0-9_-]",
                    self.name
                ),
            )
            .with_stages(vec![self.name.clone()]));
        }

        if self.runner.name() != self.name {
            return Err(RegistryError::new(
                "REGISTRY-NAME",
                format!(
                    "Stage '{}' is backed by a runner named '{}'",
                    self.name,
                    self.runner.name()
                ),
            )
            .with_stages(vec![self.name.clone()]));
        }

        if self.roles.is_restart_target && self.roles.skip_on_correction {
            return Err(RegistryError::new(
                "REGISTRY-ROLES",
                format!(
                    "Stage '{}' cannot be both the restart target and skipped on correction",
                    self.name
                ),
            )
            .with_stages(vec![self.name.clone()]));
        }

        Ok(())
    }
}
