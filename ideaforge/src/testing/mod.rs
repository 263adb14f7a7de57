//! Testing utilities for supervisor pipelines.
//!
//! This module provides:
//! - Scriptable, erroring and panicking stages
//! - The idea-to-code pipeline assembled from scripted stages
//! - Assertions over execution record trails

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_all_finalized, assert_last_status, assert_never_ran_in_correction,
    assert_record_count, assert_stage_sequence, records_for, records_in_cycle,
};
pub use fixtures::{ScriptedPipeline, IDEA_TO_CODE_ORDER};
pub use mocks::{ErroringStage, PanickingStage, ScriptedStage};
