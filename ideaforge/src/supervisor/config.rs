//! Supervisor policy configuration.

use crate::errors::SupervisorError;
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`SupervisorConfig::max_correction_cycles`].
pub const ENV_MAX_CORRECTION_CYCLES: &str = "IDEAFORGE_MAX_CORRECTION_CYCLES";

/// Environment variable overriding [`SupervisorConfig::emit_events`].
pub const ENV_EMIT_EVENTS: &str = "IDEAFORGE_EMIT_EVENTS";

/// Default number of passes through the restart target.
pub const DEFAULT_MAX_CORRECTION_CYCLES: u32 = 3;

/// Policy knobs of the pipeline supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Total passes through the restart target, the first pass included.
    #[serde(default = "default_max_correction_cycles")]
    pub max_correction_cycles: u32,
    /// Whether progress events are sent to the event sink.
    #[serde(default = "default_emit_events")]
    pub emit_events: bool,
}

fn default_max_correction_cycles() -> u32 {
    DEFAULT_MAX_CORRECTION_CYCLES
}

fn default_emit_events() -> bool {
    true
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_correction_cycles: default_max_correction_cycles(),
            emit_events: default_emit_events(),
        }
    }
}

impl SupervisorConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the correction budget.
    #[must_use]
    pub fn with_max_correction_cycles(mut self, cycles: u32) -> Self {
        self.max_correction_cycles = cycles;
        self
    }

    /// Enables or disables progress events.
    #[must_use]
    pub fn with_emit_events(mut self, enabled: bool) -> Self {
        self.emit_events = enabled;
        self
    }

    /// Reads overrides from the process environment on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a variable is set but unparseable, or the result
    /// fails [`SupervisorConfig::validate`].
    pub fn from_env() -> Result<Self, SupervisorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`SupervisorConfig::from_env`] with a custom variable source.
    ///
    /// # Errors
    ///
    /// See [`SupervisorConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SupervisorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MAX_CORRECTION_CYCLES) {
            config.max_correction_cycles = raw.trim().parse().map_err(|_| {
                SupervisorError::Config(format!(
                    "{ENV_MAX_CORRECTION_CYCLES} must be a positive integer, got {raw:?}"
                ))
            })?;
        }
        if let Some(raw) = lookup(ENV_EMIT_EVENTS) {
            config.emit_events = raw.trim().parse().map_err(|_| {
                SupervisorError::Config(format!("{ENV_EMIT_EVENTS} must be true or false, got {raw:?}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the correction budget is zero.
    pub fn validate(&self) -> Result<(), SupervisorError> {
        if self.max_correction_cycles == 0 {
            return Err(SupervisorError::Config(
                "max_correction_cycles must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
