//! Pipeline supervision.
//!
//! This module provides:
//! - The [`PipelineSupervisor`] state machine
//! - Policy configuration
//! - The outcome types returned to the web layer

mod config;
mod outcome;
mod runner;


pub use config::{
    SupervisorConfig, DEFAULT_MAX_CORRECTION_CYCLES, ENV_EMIT_EVENTS, ENV_MAX_CORRECTION_CYCLES,
};
pub use outcome::{ResumeOutcome, ResumeStatus, RunOutcome, StageRunSummary, StatusReport};
pub use runner::PipelineSupervisor;
