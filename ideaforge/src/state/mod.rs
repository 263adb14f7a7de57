//! Persisted models: project state and execution records.

mod project;
mod record;

pub use project::ProjectState;
pub use record::{ExecutionRecord, INTERRUPTED_ERROR};
