//! Persistence port and adapters.
//!
//! The supervisor reaches durable storage only through [`PersistencePort`].
//! Every write is scoped by `project_id`; adapters never need a lock that
//! spans projects.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::InMemoryStore;

use crate::errors::PersistenceError;
use crate::state::{ExecutionRecord, ProjectState};
use async_trait::async_trait;

/// Result alias for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Storage operations the supervisor depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistencePort: Send + Sync {
    /// Loads a project's state, `None` if it was never created.
    async fn load_project(&self, project_id: &str) -> PersistenceResult<Option<ProjectState>>;

    /// Inserts a new project.
    ///
    /// Fails with `Conflict` if the project already exists.
    async fn create_project(&self, state: &ProjectState) -> PersistenceResult<()>;

    /// Writes a project's state.
    async fn save_project(&self, state: &ProjectState) -> PersistenceResult<()>;

    /// Appends a `running` execution record.
    ///
    /// Fails with `Conflict` if a record for the same project, run, stage
    /// and cycle exists.
    async fn create_execution_record(&self, record: &ExecutionRecord) -> PersistenceResult<()>;

    /// Replaces a `running` record with its finalized copy.
    ///
    /// Fails with `RecordNotFound` for an unknown id and `Conflict` if the
    /// stored record is already final.
    async fn finalize_execution_record(&self, record: &ExecutionRecord) -> PersistenceResult<()>;

    /// Lists a project's records in the order they were started.
    async fn list_execution_records(&self, project_id: &str)
        -> PersistenceResult<Vec<ExecutionRecord>>;

    /// Finalizes a record and saves the project state as one step.
    ///
    /// The default implementation is sequential; adapters that can commit
    /// both writes atomically override it.
    async fn checkpoint_stage(
        &self,
        record: &ExecutionRecord,
        state: &ProjectState,
    ) -> PersistenceResult<()> {
        self.finalize_execution_record(record).await?;
        self.save_project(state).await
    }
}

/// Checks a finalize request against the stored record.
pub(crate) fn check_finalize(
    stored: &ExecutionRecord,
    finalized: &ExecutionRecord,
) -> PersistenceResult<()> {
    if stored.is_finalized() {
        return Err(PersistenceError::Conflict(format!(
            "execution record {} is already finalized",
            stored.id
        )));
    }
    if !finalized.is_finalized() {
        return Err(PersistenceError::Conflict(format!(
            "execution record {} must be finalized with a terminal status",
            finalized.id
        )));
    }
    if !stored.same_slot(finalized) {
        return Err(PersistenceError::Conflict(format!(
            "execution record {} cannot change its project, run, stage or cycle",
            stored.id
        )));
    }
    Ok(())
}

/// Checks a new record against the records already stored.
pub(crate) fn check_create(
    existing: &[ExecutionRecord],
    record: &ExecutionRecord,
) -> PersistenceResult<()> {
    if record.is_finalized() {
        return Err(PersistenceError::Conflict(format!(
            "execution record {} must be created in running status",
            record.id
        )));
    }
    if let Some(dup) = existing
        .iter()
        .find(|stored| stored.id == record.id || stored.same_slot(record))
    {
        return Err(PersistenceError::Conflict(format!(
            "stage '{}' already has record {} for cycle {} of run {}",
            record.stage_name, dup.id, record.cycle, record.pipeline_run_id
        )));
    }
    Ok(())
}
