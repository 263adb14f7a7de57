//! In-memory persistence adapter.

use super::{check_create, check_finalize, PersistencePort, PersistenceResult};
use crate::errors::PersistenceError;
use crate::state::{ExecutionRecord, ProjectState};
use async_trait::async_trait;
use dashmap::DashMap;

/// A project's state and its records, stored together.
#[derive(Debug, Clone)]
struct ProjectSlot {
    state: ProjectState,
    records: Vec<ExecutionRecord>,
}

/// In-memory store used by tests and single-process deployments.
///
/// Each project lives in one map entry, so a checkpoint holds only that
/// project's shard lock while writing the record and the state.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    projects: DashMap<String, ProjectSlot>,
}

impl InMemoryStore {
    /// Creates a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of projects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Inserts a record as-is, bypassing validation.
    ///
    /// Lets tests stage the leftovers of a crashed process.
    pub fn insert_raw_record(&self, record: ExecutionRecord) {
        if let Some(mut slot) = self.projects.get_mut(&record.project_id) {
            slot.records.push(record);
        }
    }
}

#[async_trait]
impl PersistencePort for InMemoryStore {
    async fn load_project(&self, project_id: &str) -> PersistenceResult<Option<ProjectState>> {
        Ok(self.projects.get(project_id).map(|slot| slot.state.clone()))
    }

    async fn create_project(&self, state: &ProjectState) -> PersistenceResult<()> {
        match self.projects.entry(state.project_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(PersistenceError::Conflict(format!(
                "project {} already exists",
                state.project_id
            ))),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(ProjectSlot {
                    state: state.clone(),
                    records: Vec::new(),
                });
                Ok(())
            }
        }
    }

    async fn save_project(&self, state: &ProjectState) -> PersistenceResult<()> {
        self.projects
            .entry(state.project_id.clone())
            .and_modify(|slot| slot.state = state.clone())
            .or_insert_with(|| ProjectSlot {
                state: state.clone(),
                records: Vec::new(),
            });
        Ok(())
    }

    async fn create_execution_record(&self, record: &ExecutionRecord) -> PersistenceResult<()> {
        let mut slot = self
            .projects
            .get_mut(&record.project_id)
            .ok_or_else(|| PersistenceError::ProjectNotFound(record.project_id.clone()))?;

        check_create(&slot.records, record)?;
        slot.records.push(record.clone());
        Ok(())
    }

    async fn finalize_execution_record(&self, record: &ExecutionRecord) -> PersistenceResult<()> {
        let mut slot = self
            .projects
            .get_mut(&record.project_id)
            .ok_or_else(|| PersistenceError::ProjectNotFound(record.project_id.clone()))?;

        let stored = slot
            .records
            .iter_mut()
            .find(|stored| stored.id == record.id)
            .ok_or_else(|| PersistenceError::RecordNotFound(record.id.to_string()))?;

        check_finalize(stored, record)?;
        *stored = record.clone();
        Ok(())
    }

    async fn list_execution_records(
        &self,
        project_id: &str,
    ) -> PersistenceResult<Vec<ExecutionRecord>> {
        Ok(self
            .projects
            .get(project_id)
            .map(|slot| slot.records.clone())
            .unwrap_or_default())
    }

    async fn checkpoint_stage(
        &self,
        record: &ExecutionRecord,
        state: &ProjectState,
    ) -> PersistenceResult<()> {
        if record.project_id != state.project_id {
            return Err(PersistenceError::Conflict(format!(
                "record of project {} checkpointed with state of project {}",
                record.project_id, state.project_id
            )));
        }

        let mut slot = self
            .projects
            .get_mut(&record.project_id)
            .ok_or_else(|| PersistenceError::ProjectNotFound(record.project_id.clone()))?;

        let position = slot
            .records
            .iter()
            .position(|stored| stored.id == record.id)
            .ok_or_else(|| PersistenceError::RecordNotFound(record.id.to_string()))?;

        check_finalize(&slot.records[position], record)?;
        slot.records[position] = record.clone();
        slot.state = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RecordStatus, StageMetrics};
    use crate::utils::generate_uuid;

    async fn store_with_project(project_id: &str) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.create_project(&ProjectState::new(project_id)).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_and_load_project() {
        let store = store_with_project("p1").await;

        let loaded = store.load_project("p1").await.unwrap().unwrap();
        assert_eq!(loaded.project_id, "p1");
        assert!(store.load_project("missing").await.unwrap().is_none());

        let dup = store.create_project(&ProjectState::new("p1")).await;
        assert!(matches!(dup, Err(PersistenceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_record_lifecycle() {
        let store = store_with_project("p1").await;
        let record = ExecutionRecord::start("p1", generate_uuid(), "builder", 0);
        store.create_execution_record(&record).await.unwrap();

        let done = record.finalize(RecordStatus::Completed, StageMetrics::default(), None);
        store.finalize_execution_record(&done).await.unwrap();

        let records = store.list_execution_records("p1").await.unwrap();
        assert_eq!(records, vec![done.clone()]);

        let again = store.finalize_execution_record(&done).await;
        assert!(matches!(again, Err(PersistenceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_duplicate_slot_rejected() {
        let store = store_with_project("p1").await;
        let run = generate_uuid();
        store
            .create_execution_record(&ExecutionRecord::start("p1", run, "tester", 1))
            .await
            .unwrap();

        let dup = store
            .create_execution_record(&ExecutionRecord::start("p1", run, "tester", 1))
            .await;
        assert!(matches!(dup, Err(PersistenceError::Conflict(_))));

        store
            .create_execution_record(&ExecutionRecord::start("p1", run, "tester", 2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_record_for_unknown_project() {
        let store = InMemoryStore::new();
        let result = store
            .create_execution_record(&ExecutionRecord::start("ghost", generate_uuid(), "a", 0))
            .await;
        assert!(matches!(result, Err(PersistenceError::ProjectNotFound(_))));
    }

    #[tokio::test]
    async fn test_finalize_unknown_record() {
        let store = store_with_project("p1").await;
        let record = ExecutionRecord::start("p1", generate_uuid(), "a", 0)
            .finalize(RecordStatus::Failed, StageMetrics::default(), None);

        let result = store.finalize_execution_record(&record).await;
        assert!(matches!(result, Err(PersistenceError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_checkpoint_writes_record_and_state_together() {
        let store = store_with_project("p1").await;
        let record = ExecutionRecord::start("p1", generate_uuid(), "schema", 0);
        store.create_execution_record(&record).await.unwrap();

        let mut state = store.load_project("p1").await.unwrap().unwrap();
        state.context.insert("schema", serde_json::json!({"tables": 2}));
        let done = record.finalize(RecordStatus::Completed, StageMetrics::default(), None);

        store.checkpoint_stage(&done, &state).await.unwrap();

        let loaded = store.load_project("p1").await.unwrap().unwrap();
        assert_eq!(loaded.context.get("schema"), Some(&serde_json::json!({"tables": 2})));
        assert!(store.list_execution_records("p1").await.unwrap()[0].is_finalized());
    }

    #[tokio::test]
    async fn test_failed_checkpoint_leaves_state_untouched() {
        let store = store_with_project("p1").await;
        let mut state = store.load_project("p1").await.unwrap().unwrap();
        state.context.insert("leak", serde_json::json!(true));

        let orphan = ExecutionRecord::start("p1", generate_uuid(), "a", 0)
            .finalize(RecordStatus::Completed, StageMetrics::default(), None);
        assert!(store.checkpoint_stage(&orphan, &state).await.is_err());

        let loaded = store.load_project("p1").await.unwrap().unwrap();
        assert!(loaded.context.get("leak").is_none());
    }
}
