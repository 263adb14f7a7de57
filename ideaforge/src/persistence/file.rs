//! JSON file persistence adapter.
//!
//! Each project is one document `<root>/<project_id>.json` holding the state
//! and every execution record. Writes go to a temporary file that is then
//! renamed over the document, so a reader or a crashed writer never sees a
//! half-written project.

use super::{check_create, check_finalize, PersistencePort, PersistenceResult};
use crate::errors::PersistenceError;
use crate::state::{ExecutionRecord, ProjectState};
use crate::utils::is_valid_project_id;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProjectDocument {
    state: ProjectState,
    #[serde(default)]
    records: Vec<ExecutionRecord>,
}

/// Holds a project's write lock; drops its map entry once nobody else
/// waits on it.
struct ProjectLock<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    project_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ProjectLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.project_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// File-backed store that survives process restarts.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl JsonFileStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "Opened JSON file store");
        Ok(Self {
            root,
            locks: DashMap::new(),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, project_id: &str) -> PersistenceResult<PathBuf> {
        if !is_valid_project_id(project_id) {
            return Err(PersistenceError::Backend(format!(
                "project id {project_id:?} is not a valid file name"
            )));
        }
        Ok(self.root.join(format!("{project_id}.json")))
    }

    async fn lock(&self, project_id: &str) -> ProjectLock<'_> {
        let lock = self
            .locks
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        ProjectLock {
            locks: &self.locks,
            project_id: project_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Returns the number of projects with a write in flight.
    #[must_use]
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }

    async fn read_document(&self, project_id: &str) -> PersistenceResult<Option<ProjectDocument>> {
        let path = self.document_path(project_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_document(&self, document: &ProjectDocument) -> PersistenceResult<()> {
        let path = self.document_path(&document.state.project_id)?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(document)?;

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn require_document(&self, project_id: &str) -> PersistenceResult<ProjectDocument> {
        self.read_document(project_id)
            .await?
            .ok_or_else(|| PersistenceError::ProjectNotFound(project_id.to_string()))
    }
}

#[async_trait]
impl PersistencePort for JsonFileStore {
    async fn load_project(&self, project_id: &str) -> PersistenceResult<Option<ProjectState>> {
        Ok(self.read_document(project_id).await?.map(|doc| doc.state))
    }

    async fn create_project(&self, state: &ProjectState) -> PersistenceResult<()> {
        let _lock = self.lock(&state.project_id).await;

        if self.read_document(&state.project_id).await?.is_some() {
            return Err(PersistenceError::Conflict(format!(
                "project {} already exists",
                state.project_id
            )));
        }

        self.write_document(&ProjectDocument {
            state: state.clone(),
            records: Vec::new(),
        })
        .await
    }

    async fn save_project(&self, state: &ProjectState) -> PersistenceResult<()> {
        let _lock = self.lock(&state.project_id).await;

        let records = self
            .read_document(&state.project_id)
            .await?
            .map(|doc| doc.records)
            .unwrap_or_default();

        self.write_document(&ProjectDocument {
            state: state.clone(),
            records,
        })
        .await
    }

    async fn create_execution_record(&self, record: &ExecutionRecord) -> PersistenceResult<()> {
        let _lock = self.lock(&record.project_id).await;

        let mut doc = self.require_document(&record.project_id).await?;
        check_create(&doc.records, record)?;
        doc.records.push(record.clone());
        self.write_document(&doc).await
    }

    async fn finalize_execution_record(&self, record: &ExecutionRecord) -> PersistenceResult<()> {
        let _lock = self.lock(&record.project_id).await;

        let mut doc = self.require_document(&record.project_id).await?;
        let stored = doc
            .records
            .iter_mut()
            .find(|stored| stored.id == record.id)
            .ok_or_else(|| PersistenceError::RecordNotFound(record.id.to_string()))?;

        check_finalize(stored, record)?;
        *stored = record.clone();
        self.write_document(&doc).await
    }

    async fn list_execution_records(
        &self,
        project_id: &str,
    ) -> PersistenceResult<Vec<ExecutionRecord>> {
        Ok(self
            .read_document(project_id)
            .await?
            .map(|doc| doc.records)
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

        let _lock = self.lock(&record.project_id).await;

        let mut doc = self.require_document(&record.project_id).await?;
        let stored = doc
            .records
            .iter_mut()
            .find(|stored| stored.id == record.id)
            .ok_or_else(|| PersistenceError::RecordNotFound(record.id.to_string()))?;

        check_finalize(stored, record)?;
        *stored = record.clone();
        doc.state = state.clone();
        self.write_document(&doc).await
    }
}
