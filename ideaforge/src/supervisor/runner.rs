//! The pipeline supervisor.

use super::{ResumeOutcome, ResumeStatus, RunOutcome, StatusReport, SupervisorConfig};
use crate::core::{ProjectStatus, RecordStatus, StageMetrics, StageStatus};
use crate::errors::SupervisorError;
use crate::events::{event_types, EventSink, NoOpEventSink, PipelineEvent};
use crate::persistence::PersistencePort;
use crate::registry::{StageRegistry, StageSpec};
use crate::state::{ExecutionRecord, ProjectState};
use crate::utils::{elapsed_ms, generate_uuid_v7};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// How one pass over the stages ended.
#[derive(Debug)]
enum PassOutcome {
    Completed,
    Paused,
    RebuildRequired(Vec<String>),
    Failed(SupervisorError),
}

/// How one stage call ended, from the loop's point of view.
#[derive(Debug)]
enum StageStep {
    Continue,
    Paused,
    RebuildRequired(SupervisorError),
    Failed(SupervisorError),
}

impl StageStep {
    fn error(&self) -> Option<&SupervisorError> {
        match self {
            Self::RebuildRequired(error) | Self::Failed(error) => Some(error),
            Self::Continue | Self::Paused => None,
        }
    }
}

/// What gets written to the record once a stage call returns.
struct Settled {
    status: RecordStatus,
    error_log: Option<String>,
    step: StageStep,
}

/// Drives projects through the stage registry.
///
/// One supervisor serves any number of projects; it keeps no per-project
/// state in memory, so distinct projects can run concurrently through a
/// shared `Arc<PipelineSupervisor>`. Runs of the same project must be
/// serialized by the caller.
pub struct PipelineSupervisor {
    registry: StageRegistry,
    store: Arc<dyn PersistencePort>,
    events: Arc<dyn EventSink>,
    config: SupervisorConfig,
}

impl std::fmt::Debug for PipelineSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineSupervisor")
            .field("stages", &self.registry.stage_names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PipelineSupervisor {
    /// Creates a supervisor.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid.
    pub fn new(
        registry: StageRegistry,
        store: Arc<dyn PersistencePort>,
        config: SupervisorConfig,
    ) -> Result<Self, SupervisorError> {
        config.validate()?;
        Ok(Self {
            registry,
            store,
            events: Arc::new(NoOpEventSink),
            config,
        })
    }

    /// Sets the sink progress events are sent to.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Returns the stage registry.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Runs a project's pipeline until it completes, fails or pauses.
    ///
    /// Stage failures never surface as `Err`; they end the run in `FAILED`
    /// and are reported in [`RunOutcome::failure`].
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown project, `InvalidTransition` while
    /// the project awaits mockup approval, and `Persistence` if the store
    /// fails.
    pub async fn run_pipeline(&self, project_id: &str) -> Result<RunOutcome, SupervisorError> {
        let run_id = generate_uuid_v7();
        let span = info_span!("run_pipeline", project_id = %project_id, run_id = %run_id);
        self.run_inner(project_id, run_id).instrument(span).await
    }

    /// Approves a paused project so the next run continues after the pause.
    ///
    /// Returns `no_change` for a project that is not awaiting review, which
    /// makes repeated calls harmless.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown project and `Persistence` if the
    /// store fails.
    pub async fn resume_pipeline(&self, project_id: &str) -> Result<ResumeOutcome, SupervisorError> {
        let mut state = self.load(project_id).await?;

        if state.status != ProjectStatus::UxReviewPending {
            debug!(project_id, status = %state.status, "Nothing to resume");
            return Ok(ResumeOutcome {
                project_id: project_id.to_string(),
                status: ResumeStatus::NoChange,
                message: format!("Project is {}, not awaiting review", state.status),
            });
        }

        state.transition_to(ProjectStatus::MockupApproved)?;
        self.store.save_project(&state).await?;

        info!(project_id, "Mockup approved");
        self.emit(PipelineEvent::new(
            event_types::PIPELINE_RESUMED,
            project_id,
            state.correction_cycle,
        ))
        .await;

        let restart_stage = self
            .registry
            .restart_target_index()
            .and_then(|index| self.registry.stage_at(index))
            .map_or("the first stage", |spec| spec.name.as_str());

        Ok(ResumeOutcome {
            project_id: project_id.to_string(),
            status: ResumeStatus::Resumed,
            message: format!("Mockup approved; the next run starts at {restart_stage}"),
        })
    }

    /// Strict form of [`PipelineSupervisor::resume_pipeline`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the project awaits review.
    pub async fn approve_mockup(&self, project_id: &str) -> Result<ResumeOutcome, SupervisorError> {
        let state = self.load(project_id).await?;
        if state.status != ProjectStatus::UxReviewPending {
            return Err(SupervisorError::invalid_transition(
                project_id,
                state.status,
                ProjectStatus::MockupApproved,
            ));
        }
        self.resume_pipeline(project_id).await
    }

    /// Returns the project's state joined with its audit trail.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown project and `Persistence` if the
    /// store fails.
    pub async fn get_status(&self, project_id: &str) -> Result<StatusReport, SupervisorError> {
        let state = self.load(project_id).await?;
        let mut records = self.store.list_execution_records(project_id).await?;
        records.sort_by_key(|record| record.started_at);
        Ok(StatusReport::new(&state, &records))
    }

    async fn load(&self, project_id: &str) -> Result<ProjectState, SupervisorError> {
        self.store
            .load_project(project_id)
            .await?
            .ok_or_else(|| SupervisorError::not_found(project_id))
    }

    async fn run_inner(&self, project_id: &str, run_id: Uuid) -> Result<RunOutcome, SupervisorError> {
        let mut state = self.load(project_id).await?;

        if state.status == ProjectStatus::UxReviewPending {
            return Err(SupervisorError::invalid_transition(
                project_id,
                state.status,
                ProjectStatus::Running,
            ));
        }

        self.recover_interrupted(project_id).await?;

        let (mut index, mut cycle) = self.start_position(&mut state)?;
        state.correction_cycle = cycle;
        state.pipeline_run_id = Some(run_id);
        state.completed_at = None;
        state.touch();
        self.store.save_project(&state).await?;

        info!(start_index = index, cycle, status = %state.status, "Pipeline started");
        self.emit(
            PipelineEvent::new(event_types::PIPELINE_STARTED, project_id, cycle).with_data(
                serde_json::json!({
                    "run_id": run_id.to_string(),
                    "start_stage": self.registry.stage_at(index).map(|spec| spec.name.clone()),
                }),
            ),
        )
        .await;

        let max_cycles = self.config.max_correction_cycles;
        let failure = loop {
            match self.run_pass(&mut state, run_id, index, cycle).await? {
                PassOutcome::Completed => break None,
                PassOutcome::Failed(error) => break Some(error),
                PassOutcome::Paused => {
                    info!(cycle, "Pipeline paused for review");
                    self.emit(
                        PipelineEvent::new(event_types::PIPELINE_PAUSED, project_id, cycle)
                            .with_stage(state.current_stage.clone().unwrap_or_default()),
                    )
                    .await;
                    return Ok(Self::outcome(&state, run_id, None));
                }
                PassOutcome::RebuildRequired(gates) => {
                    if cycle + 1 >= max_cycles {
                        warn!(cycle, gates = ?gates, "Correction budget exhausted");
                        break Some(SupervisorError::CorrectionBudgetExhausted {
                            cycles: cycle + 1,
                            gates,
                        });
                    }

                    cycle += 1;
                    state.correction_cycle = cycle;
                    state.transition_to(ProjectStatus::CorrectionCycleInProgress(cycle))?;
                    self.store.save_project(&state).await?;
                    index = self.restart_index();

                    info!(cycle, gates = ?gates, "Correction cycle started");
                    self.emit(
                        PipelineEvent::new(event_types::CORRECTION_STARTED, project_id, cycle)
                            .with_data(serde_json::json!({ "gates": gates })),
                    )
                    .await;
                }
            }
        };

        let (status, event_type) = if failure.is_none() {
            (ProjectStatus::Completed, event_types::PIPELINE_COMPLETED)
        } else {
            (ProjectStatus::Failed, event_types::PIPELINE_FAILED)
        };
        state.transition_to(status)?;
        state.resume_from_approval = false;
        self.store.save_project(&state).await?;

        match &failure {
            None => info!(cycle, "Pipeline completed"),
            Some(error) => warn!(cycle, error = %error, "Pipeline failed"),
        }
        let mut event = PipelineEvent::new(event_type, project_id, cycle);
        if let Some(error) = &failure {
            event = event.with_data(serde_json::json!(error.to_dict()));
        }
        self.emit(event).await;

        Ok(Self::outcome(&state, run_id, failure))
    }

    /// Finalizes records a crashed process left in `running`.
    async fn recover_interrupted(&self, project_id: &str) -> Result<(), SupervisorError> {
        let leftovers: Vec<ExecutionRecord> = self
            .store
            .list_execution_records(project_id)
            .await?
            .into_iter()
            .filter(|record| !record.is_finalized())
            .collect();

        for record in leftovers {
            warn!(
                stage = %record.stage_name,
                cycle = record.cycle,
                record_id = %record.id,
                "Recovering interrupted stage record"
            );
            self.store
                .finalize_execution_record(&record.interrupted())
                .await?;
        }
        Ok(())
    }

    /// Picks the first stage and cycle, and moves the status to `RUNNING`
    /// unless a correction cycle is being resumed.
    ///
    /// Gate feedback only survives into a resumed correction cycle; every
    /// other start begins a new cycle 0 without it.
    fn start_position(&self, state: &mut ProjectState) -> Result<(usize, u32), SupervisorError> {
        match state.status {
            ProjectStatus::CorrectionCycleInProgress(cycle) => Ok((self.restart_index(), cycle)),
            ProjectStatus::MockupApproved => {
                state.transition_to(ProjectStatus::Running)?;
                state.resume_from_approval = true;
                state.context.clear_gate_feedback();
                Ok((self.restart_index(), 0))
            }
            ProjectStatus::Running if state.resume_from_approval => {
                warn!("Resuming an interrupted run after mockup approval");
                state.transition_to(ProjectStatus::Running)?;
                state.context.clear_gate_feedback();
                Ok((self.restart_index(), 0))
            }
            _ => {
                state.transition_to(ProjectStatus::Running)?;
                state.resume_from_approval = false;
                state.context.clear_gate_feedback();
                Ok((0, 0))
            }
        }
    }

    fn restart_index(&self) -> usize {
        self.registry.restart_target_index().unwrap_or_else(|| {
            warn!("Registry has no restart target; restarting from the first stage");
            0
        })
    }

    async fn run_pass(
        &self,
        state: &mut ProjectState,
        run_id: Uuid,
        start_index: usize,
        cycle: u32,
    ) -> Result<PassOutcome, SupervisorError> {
        let mut failing_gates: Vec<String> = Vec::new();

        for spec in self.registry.stages().iter().skip(start_index) {
            // Gates after a failed gate still run so all feedback is merged.
            if !failing_gates.is_empty() && !spec.roles.is_gate {
                break;
            }

            if cycle > 0 && spec.roles.skip_on_correction {
                debug!(stage = %spec.name, cycle, "Skipping stage during correction cycle");
                self.emit(
                    PipelineEvent::new(event_types::STAGE_SKIPPED, &state.project_id, cycle)
                        .with_stage(&spec.name),
                )
                .await;
                continue;
            }

            match self.run_stage(state, run_id, spec, cycle).await? {
                StageStep::Continue => {}
                StageStep::Paused => return Ok(PassOutcome::Paused),
                StageStep::RebuildRequired(_) => failing_gates.push(spec.name.clone()),
                StageStep::Failed(error) => return Ok(PassOutcome::Failed(error)),
            }
        }

        if failing_gates.is_empty() {
            Ok(PassOutcome::Completed)
        } else {
            Ok(PassOutcome::RebuildRequired(failing_gates))
        }
    }

    async fn run_stage(
        &self,
        state: &mut ProjectState,
        run_id: Uuid,
        spec: &StageSpec,
        cycle: u32,
    ) -> Result<StageStep, SupervisorError> {
        let project_id = state.project_id.clone();
        let record = ExecutionRecord::start(&project_id, run_id, &spec.name, cycle);
        self.store.create_execution_record(&record).await?;

        state.current_stage = Some(spec.name.clone());
        debug!(stage = %spec.name, cycle, "Stage started");
        self.emit(
            PipelineEvent::new(event_types::STAGE_STARTED, &project_id, cycle).with_stage(&spec.name),
        )
        .await;

        let snapshot = state.context.snapshot(cycle);
        let started = Instant::now();
        let invocation = AssertUnwindSafe(spec.runner.execute(&project_id, &snapshot))
            .catch_unwind()
            .await;
        let duration_ms = elapsed_ms(started);

        let mut metrics = StageMetrics {
            duration_ms,
            ..StageMetrics::default()
        };
        let settled = match invocation {
            Err(panic) => {
                let message = format!("stage panicked: {}", panic_message(panic.as_ref()));
                Self::failed(spec, cycle, message)
            }
            Ok(Err(error)) => Self::failed(spec, cycle, format!("{error:#}")),
            Ok(Ok(result)) => {
                metrics.tokens_in = result.metrics.tokens_in;
                metrics.tokens_out = result.metrics.tokens_out;
                Self::settle(state, spec, cycle, result.status, result.payload, result.error)?
            }
        };

        let finalized = record.finalize(settled.status, metrics, settled.error_log.clone());
        state.touch();
        self.store.checkpoint_stage(&finalized, state).await?;

        let event_type = match settled.step {
            StageStep::Continue | StageStep::Paused => event_types::STAGE_COMPLETED,
            StageStep::RebuildRequired(_) => event_types::GATE_REBUILD_REQUIRED,
            StageStep::Failed(_) => event_types::STAGE_FAILED,
        };
        match &settled.step {
            StageStep::Failed(_) => warn!(
                stage = %spec.name,
                cycle,
                status = %settled.status,
                duration_ms,
                error = settled.error_log.as_deref().unwrap_or_default(),
                "Stage failed"
            ),
            _ => info!(
                stage = %spec.name,
                cycle,
                status = %settled.status,
                duration_ms,
                "Stage finished"
            ),
        }
        self.emit(
            PipelineEvent::new(event_type, &project_id, cycle)
                .with_stage(&spec.name)
                .with_data(serde_json::json!({
                    "status": settled.status,
                    "duration_ms": duration_ms,
                    "error": settled.error_log,
                    "failure": settled.step.error().map(SupervisorError::to_dict),
                })),
        )
        .await;

        Ok(settled.step)
    }

    /// Applies a returned result to the state according to the stage's roles.
    fn settle(
        state: &mut ProjectState,
        spec: &StageSpec,
        cycle: u32,
        status: StageStatus,
        payload: HashMap<String, serde_json::Value>,
        error: Option<String>,
    ) -> Result<Settled, SupervisorError> {
        let roles = spec.roles;
        let settled = match status {
            StageStatus::Completed => {
                state.context.merge(&payload);
                Settled {
                    status: RecordStatus::Completed,
                    error_log: None,
                    step: StageStep::Continue,
                }
            }
            StageStatus::Failed => {
                state.context.merge(&payload);
                let message = error.unwrap_or_else(|| "stage returned failed".to_string());
                Self::failed(spec, cycle, message)
            }
            StageStatus::Paused if roles.is_pause_point => {
                state.context.merge(&payload);
                state.pause_payload = Some(payload);
                state.transition_to(ProjectStatus::UxReviewPending)?;
                Settled {
                    status: RecordStatus::Paused,
                    error_log: None,
                    step: StageStep::Paused,
                }
            }
            StageStatus::RebuildRequired if roles.is_gate => {
                state.context.record_gate_feedback(cycle, &spec.name, &payload);
                Settled {
                    status: RecordStatus::RebuildRequired,
                    error_log: error,
                    step: StageStep::RebuildRequired(SupervisorError::GateFailure {
                        stage: spec.name.clone(),
                        cycle,
                    }),
                }
            }
            StageStatus::Paused | StageStatus::RebuildRequired => {
                let role = if status == StageStatus::Paused { "pause point" } else { "gate" };
                let message = format!("stage returned {status} but is not a {role}");
                Settled {
                    status: status.into(),
                    error_log: Some(message.clone()),
                    step: StageStep::Failed(SupervisorError::StageExecution {
                        stage: spec.name.clone(),
                        cycle,
                        message,
                    }),
                }
            }
        };
        Ok(settled)
    }

    fn failed(spec: &StageSpec, cycle: u32, message: String) -> Settled {
        Settled {
            status: RecordStatus::Failed,
            error_log: Some(message.clone()),
            step: StageStep::Failed(SupervisorError::StageExecution {
                stage: spec.name.clone(),
                cycle,
                message,
            }),
        }
    }

    fn outcome(state: &ProjectState, run_id: Uuid, failure: Option<SupervisorError>) -> RunOutcome {
        RunOutcome {
            project_id: state.project_id.clone(),
            pipeline_status: state.status,
            stage_runs_ref: run_id,
            correction_cycle: state.correction_cycle,
            failure,
        }
    }

    async fn emit(&self, event: PipelineEvent) {
        if self.config.emit_events {
            self.events.emit(&event).await;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
