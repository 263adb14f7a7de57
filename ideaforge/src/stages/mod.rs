//! Stage trait and implementations.
//!
//! Stages are the units of pipeline work: requirements drafting, schema
//! design, mockups, code generation, testing and so on. The supervisor only
//! sees the uniform `execute` capability.

use crate::context::ContextSnapshot;
use crate::core::StageResult;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline stages.
///
/// A stage must not write execution records or project state; the
/// supervisor owns both. It may be invoked again for the same project under
/// a higher correction cycle and must tolerate that.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage.
    ///
    /// # Arguments
    ///
    /// * `project_id` - The project being built
    /// * `context` - Snapshot of everything earlier stages produced
    ///
    /// # Errors
    ///
    /// An `Err` is recorded exactly like a `failed` result carrying the
    /// error text.
    async fn execute(
        &self,
        project_id: &str,
        context: &ContextSnapshot,
    ) -> anyhow::Result<StageResult>;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&str, &ContextSnapshot) -> anyhow::Result<StageResult> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&str, &ContextSnapshot) -> anyhow::Result<StageResult> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&str, &ContextSnapshot) -> anyhow::Result<StageResult> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&str, &ContextSnapshot) -> anyhow::Result<StageResult> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        project_id: &str,
        context: &ContextSnapshot,
    ) -> anyhow::Result<StageResult> {
        (self.func)(project_id, context)
    }
}

/// A no-op stage that always completes with an empty payload.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        _project_id: &str,
        _context: &ContextSnapshot,
    ) -> anyhow::Result<StageResult> {
        Ok(StageResult::completed_empty())
    }
}
