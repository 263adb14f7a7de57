//! Context management for pipeline execution.
//!
//! This module provides:
//! - The mergeable project context persisted with each project
//! - Immutable snapshots handed to stages

mod bag;
mod snapshot;

pub use bag::{ProjectContext, CORRECTION_FEEDBACK_KEY};
pub use snapshot::ContextSnapshot;
