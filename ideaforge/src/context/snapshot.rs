//! Immutable context snapshots handed to stages.

use super::CORRECTION_FEEDBACK_KEY;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A read-only view of the project context at the moment a stage starts.
///
/// Stages never mutate the context directly; they return a payload that the
/// supervisor merges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Context entries.
    #[serde(default)]
    data: HashMap<String, serde_json::Value>,
    /// The correction cycle of the current pass (0 for the first pass).
    #[serde(default)]
    cycle: u32,
}

impl ContextSnapshot {
    /// Creates a snapshot.
    #[must_use]
    pub fn new(data: HashMap<String, serde_json::Value>, cycle: u32) -> Self {
        Self { data, cycle }
    }

    /// Returns the correction cycle.
    #[must_use]
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Returns true when running inside a correction cycle.
    #[must_use]
    pub fn is_correction(&self) -> bool {
        self.cycle > 0
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Gets a string value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns the gate feedback a restart stage should act on, if any.
    #[must_use]
    pub fn correction_feedback(&self) -> Option<&serde_json::Value> {
        self.data.get(CORRECTION_FEEDBACK_KEY)
    }

    /// Returns all entries.
    #[must_use]
    pub fn data(&self) -> &HashMap<String, serde_json::Value> {
        &self.data
    }
}
