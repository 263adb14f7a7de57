//! Scriptable stages for supervisor tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::context::ContextSnapshot;
use crate::core::StageResult;
use crate::stages::Stage;

/// A stage whose result depends on the correction cycle it runs in.
///
/// Every call is recorded together with the snapshot it received, so tests
/// can check both how often a stage ran and what it saw.
#[derive(Debug)]
pub struct ScriptedStage {
    name: String,
    default: Mutex<StageResult>,
    by_cycle: Mutex<HashMap<u32, StageResult>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ContextSnapshot>>,
}

impl ScriptedStage {
    /// Creates a stage that completes with `{<name>: "<name> output"}`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let default = StageResult::completed_value(name.clone(), serde_json::json!(format!("{name} output")));
        Self {
            name,
            default: Mutex::new(default),
            by_cycle: Mutex::new(HashMap::new()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sets the result returned when no cycle-specific one exists.
    #[must_use]
    pub fn returning(self, result: StageResult) -> Self {
        *self.default.lock() = result;
        self
    }

    /// Sets the result returned in one cycle.
    #[must_use]
    pub fn on_cycle(self, cycle: u32, result: StageResult) -> Self {
        self.by_cycle.lock().insert(cycle, result);
        self
    }

    /// Sleeps before returning, to exercise duration measurement.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replaces the default result after construction.
    pub fn set_result(&self, result: StageResult) {
        *self.default.lock() = result;
        self.by_cycle.lock().clear();
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the snapshots received, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<ContextSnapshot> {
        self.calls.lock().clone()
    }

    /// Returns the cycle of every call.
    #[must_use]
    pub fn cycles_seen(&self) -> Vec<u32> {
        self.calls.lock().iter().map(ContextSnapshot::cycle).collect()
    }

    /// Returns the snapshot of the most recent call.
    #[must_use]
    pub fn last_context(&self) -> Option<ContextSnapshot> {
        self.calls.lock().last().cloned()
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        _project_id: &str,
        context: &ContextSnapshot,
    ) -> anyhow::Result<StageResult> {
        self.calls.lock().push(context.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.by_cycle.lock().get(&context.cycle()).cloned();
        Ok(scripted.unwrap_or_else(|| self.default.lock().clone()))
    }
}

/// A stage that always returns an `Err`.
#[derive(Debug)]
pub struct ErroringStage {
    name: String,
    message: String,
}

impl ErroringStage {
    /// Creates a new erroring stage.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Stage for ErroringStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        project_id: &str,
        _context: &ContextSnapshot,
    ) -> anyhow::Result<StageResult> {
        Err(anyhow::anyhow!("{}", self.message).context(format!("{} failed for {project_id}", self.name)))
    }
}

/// A stage that panics when executed.
#[derive(Debug)]
pub struct PanickingStage {
    name: String,
    message: String,
}

impl PanickingStage {
    /// Creates a new panicking stage.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Stage for PanickingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        _project_id: &str,
        _context: &ContextSnapshot,
    ) -> anyhow::Result<StageResult> {
        panic!("{}", self.message);
    }
}
