//! Core domain model types for ideaforge.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage, record and project status enums
//! - Stage result type with factory methods

mod result;
mod status;

pub use result::{StageMetrics, StageResult};
pub use status::{ProjectStatus, RecordStatus, StageStatus};
