//! Mergeable project context.

use super::ContextSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reserved context key holding gate feedback for the restart stage.
pub const CORRECTION_FEEDBACK_KEY: &str = "correction_feedback";

/// Accumulated key-value state of one project's pipeline.
///
/// Stage payloads are merged in with later keys overwriting earlier ones.
/// Gate feedback is additionally namespaced per gate under
/// [`CORRECTION_FEEDBACK_KEY`] so several failing gates of one cycle never
/// collide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectContext {
    data: HashMap<String, serde_json::Value>,
}

impl ProjectContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context from existing data.
    #[must_use]
    pub fn from_data(data: HashMap<String, serde_json::Value>) -> Self {
        Self { data }
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Sets a value, overwriting any previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Merges a stage payload into the context.
    pub fn merge(&mut self, payload: &HashMap<String, serde_json::Value>) {
        for (key, value) in payload {
            self.data.insert(key.clone(), value.clone());
        }
    }

    /// Records a failing gate's payload for the next correction cycle.
    ///
    /// Feedback from an older cycle is discarded when the first failure of a
    /// newer cycle arrives; failures within one cycle accumulate.
    pub fn record_gate_feedback(
        &mut self,
        cycle: u32,
        gate: &str,
        payload: &HashMap<String, serde_json::Value>,
    ) {
        self.merge(payload);

        let stale = self
            .feedback_cycle()
            .map_or(true, |recorded| recorded != cycle);
        if stale {
            self.data.insert(
                CORRECTION_FEEDBACK_KEY.to_string(),
                serde_json::json!({ "cycle": cycle, "gates": {} }),
            );
        }

        let gate_payload: serde_json::Map<String, serde_json::Value> =
            payload.clone().into_iter().collect();
        if let Some(gates) = self
            .data
            .get_mut(CORRECTION_FEEDBACK_KEY)
            .and_then(|feedback| feedback.get_mut("gates"))
            .and_then(serde_json::Value::as_object_mut)
        {
            gates.insert(gate.to_string(), serde_json::Value::Object(gate_payload));
        }
    }

    /// Drops stored gate feedback, returning true if there was any.
    pub fn clear_gate_feedback(&mut self) -> bool {
        self.data.remove(CORRECTION_FEEDBACK_KEY).is_some()
    }

    /// Returns the cycle the stored gate feedback belongs to.
    #[must_use]
    pub fn feedback_cycle(&self) -> Option<u32> {
        self.data
            .get(CORRECTION_FEEDBACK_KEY)
            .and_then(|feedback| feedback.get("cycle"))
            .and_then(serde_json::Value::as_u64)
            .and_then(|cycle| u32::try_from(cycle).ok())
    }

    /// Returns the stored feedback of one gate.
    #[must_use]
    pub fn gate_feedback(&self, gate: &str) -> Option<&serde_json::Value> {
        self.data
            .get(CORRECTION_FEEDBACK_KEY)
            .and_then(|feedback| feedback.get("gates"))
            .and_then(|gates| gates.get(gate))
    }

    /// Returns the names of gates with stored feedback.
    #[must_use]
    pub fn failing_gates(&self) -> Vec<String> {
        let mut gates: Vec<String> = self
            .data
            .get(CORRECTION_FEEDBACK_KEY)
            .and_then(|feedback| feedback.get("gates"))
            .and_then(serde_json::Value::as_object)
            .map(|gates| gates.keys().cloned().collect())
            .unwrap_or_default();
        gates.sort();
        gates
    }

    /// Takes an immutable snapshot for a stage call.
    #[must_use]
    pub fn snapshot(&self, cycle: u32) -> ContextSnapshot {
        ContextSnapshot::new(self.data.clone(), cycle)
    }

    /// Returns a copy of all data.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        self.data.clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the context is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn payload(entries: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_merge_overwrites() {
        let mut ctx = ProjectContext::new();
        ctx.merge(&payload(&[("spec", serde_json::json!("v1")), ("schema", serde_json::json!({}))]));
        ctx.merge(&payload(&[("spec", serde_json::json!("v2"))]));

        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.get("spec"), Some(&serde_json::json!("v2")));
    }

    #[test]
    fn test_gate_feedback_accumulates_within_cycle() {
        let mut ctx = ProjectContext::new();
        ctx.record_gate_feedback(0, "tester", &payload(&[("failures", serde_json::json!(["t1"]))]));
        ctx.record_gate_feedback(0, "security", &payload(&[("findings", serde_json::json!(["xss"]))]));

        assert_eq!(ctx.feedback_cycle(), Some(0));
        assert_eq!(ctx.failing_gates(), vec!["security".to_string(), "tester".to_string()]);
        assert_eq!(
            ctx.gate_feedback("tester"),
            Some(&serde_json::json!({"failures": ["t1"]}))
        );
        assert_eq!(ctx.get("findings"), Some(&serde_json::json!(["xss"])));
    }

    #[test]
    fn test_gate_feedback_replaced_by_newer_cycle() {
        let mut ctx = ProjectContext::new();
        ctx.record_gate_feedback(0, "tester", &payload(&[("failures", serde_json::json!(["t1"]))]));
        ctx.record_gate_feedback(1, "security", &payload(&[("findings", serde_json::json!([]))]));

        assert_eq!(ctx.feedback_cycle(), Some(1));
        assert_eq!(ctx.failing_gates(), vec!["security".to_string()]);
        assert!(ctx.gate_feedback("tester").is_none());
    }

    #[test]
    fn test_clear_gate_feedback_keeps_payloads() {
        let mut ctx = ProjectContext::new();
        ctx.record_gate_feedback(0, "tester", &payload(&[("failures", serde_json::json!(["t1"]))]));

        assert!(ctx.clear_gate_feedback());
        assert!(!ctx.clear_gate_feedback());
        assert!(ctx.feedback_cycle().is_none());
        assert!(ctx.failing_gates().is_empty());
        assert_eq!(ctx.get("failures"), Some(&serde_json::json!(["t1"])));

        ctx.record_gate_feedback(0, "security", &payload(&[("findings", serde_json::json!([]))]));
        assert_eq!(ctx.failing_gates(), vec!["security".to_string()]);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut ctx = ProjectContext::new();
        ctx.insert("idea", serde_json::json!("todo app"));

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json, serde_json::json!({"idea": "todo app"}));

        let back: ProjectContext = serde_json::from_value(json).unwrap();
        assert_eq!(back, ctx);
    }
}
