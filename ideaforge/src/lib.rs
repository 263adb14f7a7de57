//! # Ideaforge
//!
//! Resumable pipeline supervisor for multi-agent idea-to-code generation.
//!
//! A project moves through an ordered list of stages (planning, requirements,
//! architecture, schema, mockup, code generation, documentation, testing,
//! security review). The supervisor provides:
//!
//! - **Declarative stage roles**: pause points, quality gates, a restart
//!   target and stages skipped during correction
//! - **Bounded correction cycles**: failing gates send the pipeline back to
//!   the restart target with their feedback merged into the context
//! - **Human review**: a pause stage suspends the run until the mockup is
//!   approved
//! - **Audit trail**: one execution record per stage attempt, written through
//!   a persistence port
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ideaforge::prelude::*;
//!
//! let registry = StageRegistry::idea_to_code(stages)?;
//! let store = Arc::new(InMemoryStore::new());
//! store.create_project(&ProjectState::new("p1")).await?;
//!
//! let supervisor = PipelineSupervisor::new(registry, store, SupervisorConfig::default())?;
//! let outcome = supervisor.run_pipeline("p1").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod persistence;
pub mod registry;
pub mod stages;
pub mod state;
pub mod supervisor;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{ContextSnapshot, ProjectContext};
    pub use crate::core::{ProjectStatus, RecordStatus, StageMetrics, StageResult, StageStatus};
    pub use crate::errors::{PersistenceError, RegistryError, SupervisorError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::persistence::{InMemoryStore, JsonFileStore, PersistencePort};
    pub use crate::registry::{IdeaToCodeStages, StageRegistry, StageRoles, StageSpec};
    pub use crate::stages::{FnStage, NoOpStage, Stage};
    pub use crate::state::{ExecutionRecord, ProjectState};
    pub use crate::supervisor::{
        PipelineSupervisor, ResumeOutcome, ResumeStatus, RunOutcome, StatusReport,
        SupervisorConfig,
    };
    pub use crate::utils::{generate_uuid, iso_timestamp, Timestamp};
}
