//! The pipeline loop. Phases run strictly in order, one at a time; each one
//! waits on its delay with no lock held, then applies its mutation
//! atomically under the session lock.

use crate::pipeline::schema::{Phase, Pipeline, PipelineKind};
use crate::runner::delay::DelayOutcome;
use crate::runner::effects::{self, RunContext};
use crate::runner::event::SimEvent;
use crate::session::{OrchestratorStatus, RunReport, SessionState, Shared};
use crate::state::derive::{derive_run_status, passed_count, skip_remaining};
use crate::state::machine::{expect_transition, PhaseStatus, PhaseUpdate, RunState, RunStatus};
use gitsim_core::error::{EngineError, RejectReason, Result};
use gitsim_core::{next_major_version, DeploymentRecord, DeploymentStatus, LogLevel};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

/// Run one pipeline to a terminal state. The main orchestrator loop.
pub(crate) async fn run_pipeline(shared: &Shared, kind: PipelineKind) -> Result<RunReport> {
    let pipeline = shared.pipeline(kind);
    let (cancel, ctx) = shared.with_state(|st| admit(shared, st, &pipeline))?;
    let guard = RunGuard::new(shared);
    tracing::info!(
        pipeline = %kind,
        from = %ctx.from_version,
        target = %ctx.target_version,
        commit = %ctx.commit_id,
        "run started"
    );

    let result = drive(shared, &pipeline, &cancel, &ctx).await;
    guard.disarm();
    match result {
        Ok(report) => {
            tracing::info!(
                run = report.run,
                pipeline = %kind,
                status = ?report.status,
                version = %report.version,
                "run finished"
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!(pipeline = %kind, error = %e, "run aborted");
            shared.with_state(|st| abort(st, &shared.now(), RunStatus::Failed));
            Err(e)
        }
    }
}

async fn drive(
    shared: &Shared,
    pipeline: &Pipeline,
    cancel: &CancellationToken,
    ctx: &RunContext,
) -> Result<RunReport> {
    let default_ms = shared.config.phase_delay_ms;
    let mut record = None;

    for (index, phase) in pipeline.phases.iter().enumerate() {
        // 1. Boundary check
        if cancel.is_cancelled() {
            return shared.with_state(|st| finish_cancelled(shared, st, None));
        }

        // 2. Pending → Running
        shared.with_state(|st| start_phase(shared, st, index, phase))?;
        tracing::debug!(phase = %phase.id, index, "phase started");

        // 3. Wait, racing the cancel token
        if shared.delay.wait(phase.delay(default_ms), cancel).await == DelayOutcome::Cancelled {
            return shared.with_state(|st| finish_cancelled(shared, st, Some(&phase.id)));
        }

        // 4. Fault hook
        if let Some(reason) = shared.faults.check(pipeline.kind, &phase.id) {
            return shared.with_state(|st| finish_failed(shared, st, ctx, phase, &reason));
        }

        // 5. Mutation + Running → Passed
        if let Some(written) = shared.with_state(|st| complete_phase(shared, st, ctx, phase))? {
            record = Some(written);
        }
    }

    shared.with_state(|st| finish_completed(shared, st, record))
}

// ── Admission ──

/// Single-flight admission: either the run is registered or the request is
/// refused without touching any component besides the log.
fn admit(
    shared: &Shared,
    st: &mut SessionState,
    pipeline: &Pipeline,
) -> Result<(CancellationToken, RunContext)> {
    let now = shared.now();
    let kind = pipeline.kind;
    let baseline = &shared.config.baseline_version;

    let rejection = if st.status == OrchestratorStatus::Running {
        Some(RejectReason::AlreadyRunning)
    } else if kind == PipelineKind::Rollback && st.cluster.current_version == *baseline {
        Some(RejectReason::AtBaselineVersion {
            version: baseline.clone(),
        })
    } else {
        None
    };
    if let Some(reason) = rejection {
        st.log(LogLevel::Warning, format!("Cannot start {kind}: {reason}"), &now);
        st.emit(
            &now,
            SimEvent::RunRejected {
                pipeline: kind,
                reason: reason.clone(),
            },
        );
        tracing::warn!(pipeline = %kind, %reason, "run rejected");
        return Err(EngineError::RunRejected { reason });
    }

    st.run_seq += 1;
    let run = st.run_seq;
    let from = st.cluster.current_version.clone();
    let target = match kind {
        PipelineKind::FeatureDeployment => next_major_version(&from),
        PipelineKind::Rollback => baseline.clone(),
    };
    let commit_id = short_hash(kind, &target, run);
    let state = RunState::from_pipeline(pipeline, run, &from, &target, &commit_id, &now);
    let ctx = RunContext::of(&state);

    let cancel = CancellationToken::new();
    st.last_run = Some(state);
    st.status = OrchestratorStatus::Running;
    st.cancel = Some(cancel.clone());
    st.log(
        LogLevel::Info,
        format!("Starting {kind}: {from} → {target}"),
        &now,
    );
    st.emit(
        &now,
        SimEvent::RunStarted {
            run,
            pipeline: kind,
            phase_count: pipeline.phases.len(),
            target_version: target,
        },
    );
    Ok((cancel, ctx))
}

/// First 7 hex chars of SHA-256 over the run identity.
pub(crate) fn short_hash(kind: PipelineKind, target: &str, run: u64) -> String {
    let digest = Sha256::digest(format!("{kind}:{target}:{run}").as_bytes());
    hex::encode(digest)[..7].to_string()
}

// ── Phase steps ──

fn active_run(st: &mut SessionState) -> Result<&mut RunState> {
    st.last_run
        .as_mut()
        .filter(|r| !r.status.is_terminal())
        .ok_or_else(|| EngineError::invariant("no active run"))
}

fn start_phase(
    shared: &Shared,
    st: &mut SessionState,
    index: usize,
    phase: &Phase,
) -> Result<()> {
    let now = shared.now();
    let state = active_run(st)?;
    expect_transition(
        state,
        &phase.id,
        PhaseStatus::Pending,
        PhaseStatus::Running,
        Some(PhaseUpdate::started(&now)),
    )?;
    let run = state.run;
    st.emit(
        &now,
        SimEvent::PhaseStarted {
            run,
            phase_id: phase.id.clone(),
            index,
        },
    );
    Ok(())
}

fn complete_phase(
    shared: &Shared,
    st: &mut SessionState,
    ctx: &RunContext,
    phase: &Phase,
) -> Result<Option<DeploymentRecord>> {
    let now = shared.now();
    // Check first: a phase must never be half applied.
    if active_run(st)?.get_phase(&phase.id)?.status != PhaseStatus::Running {
        return Err(EngineError::invariant(format!(
            "phase {} is not running",
            phase.id
        )));
    }
    let record = effects::apply(st, &shared.config, ctx, phase, &now);
    let state = active_run(st)?;
    expect_transition(
        state,
        &phase.id,
        PhaseStatus::Running,
        PhaseStatus::Passed,
        Some(PhaseUpdate::completed(&now)),
    )?;
    let run = state.run;
    st.emit(
        &now,
        SimEvent::PhasePassed {
            run,
            phase_id: phase.id.clone(),
        },
    );
    Ok(record)
}

// ── Terminal steps ──

fn finish_completed(
    shared: &Shared,
    st: &mut SessionState,
    record: Option<DeploymentRecord>,
) -> Result<RunReport> {
    let now = shared.now();
    let state = active_run(st)?;
    let status = derive_run_status(&state.phases);
    if status != RunStatus::Completed {
        return Err(EngineError::invariant(format!(
            "run {} reached the end with status {status:?}",
            state.run
        )));
    }
    state.finish(RunStatus::Completed, &now);
    let (run, kind) = (state.run, state.pipeline);

    release(st);
    let version = st.cluster.current_version.clone();
    st.emit(
        &now,
        SimEvent::RunCompleted {
            run,
            pipeline: kind,
            version: version.clone(),
        },
    );
    Ok(RunReport {
        run,
        pipeline: kind,
        status: RunStatus::Completed,
        version,
        record,
    })
}

/// Stop at a boundary. `interrupted` names the phase whose delay was cut
/// short; it ends `Cancelled`, every later phase `Skipped`. No record.
fn finish_cancelled(
    shared: &Shared,
    st: &mut SessionState,
    interrupted: Option<&str>,
) -> Result<RunReport> {
    let now = shared.now();
    let state = active_run(st)?;
    if let Some(id) = interrupted {
        expect_transition(
            state,
            id,
            PhaseStatus::Running,
            PhaseStatus::Cancelled,
            Some(PhaseUpdate::completed(&now)),
        )?;
    }
    skip_remaining(state)?;
    let passed = passed_count(state);
    state.finish(RunStatus::Cancelled, &now);
    let (run, kind) = (state.run, state.pipeline);

    release(st);
    let version = st.cluster.current_version.clone();
    st.log(
        LogLevel::Warning,
        format!("{kind} cancelled after {passed} phase(s); cluster remains at {version}"),
        &now,
    );
    st.emit(
        &now,
        SimEvent::RunCancelled {
            run,
            pipeline: kind,
            phases_passed: passed,
        },
    );
    Ok(RunReport {
        run,
        pipeline: kind,
        status: RunStatus::Cancelled,
        version,
        record: None,
    })
}

/// Stop on an injected fault. State stays at the last completed phase; a
/// `failed` record names the version that was being attempted.
fn finish_failed(
    shared: &Shared,
    st: &mut SessionState,
    ctx: &RunContext,
    phase: &Phase,
    reason: &str,
) -> Result<RunReport> {
    let now = shared.now();
    let state = active_run(st)?;
    expect_transition(
        state,
        &phase.id,
        PhaseStatus::Running,
        PhaseStatus::Failed,
        Some(PhaseUpdate {
            error: Some(reason.to_string()),
            ..PhaseUpdate::completed(&now)
        }),
    )?;
    skip_remaining(state)?;
    state.finish(RunStatus::Failed, &now);
    let (run, kind) = (state.run, state.pipeline);

    let record = DeploymentRecord {
        version: ctx.target_version.clone(),
        timestamp: now.clone(),
        status: DeploymentStatus::Failed,
        commit_id: ctx.commit_id.clone(),
    };
    st.history.record(record.clone());
    release(st);
    let version = st.cluster.current_version.clone();
    st.log(
        LogLevel::Error,
        format!(
            "{kind} failed at \"{}\": {reason}; cluster remains at {version}",
            phase.title
        ),
        &now,
    );
    st.emit(
        &now,
        SimEvent::PhaseFailed {
            run,
            phase_id: phase.id.clone(),
            error: reason.to_string(),
        },
    );
    st.emit(
        &now,
        SimEvent::RunFailed {
            run,
            pipeline: kind,
            phase_id: phase.id.clone(),
        },
    );
    tracing::warn!(run, pipeline = %kind, phase = %phase.id, %reason, "phase failed");
    Ok(RunReport {
        run,
        pipeline: kind,
        status: RunStatus::Failed,
        version,
        record: Some(record),
    })
}

fn release(st: &mut SessionState) {
    st.status = OrchestratorStatus::Idle;
    st.cancel = None;
}

/// Close an unfinished run without touching any other component.
fn abort(st: &mut SessionState, now: &str, status: RunStatus) {
    if let Some(state) = st.last_run.as_mut().filter(|r| !r.status.is_terminal()) {
        if let Some(id) = state
            .phases
            .iter()
            .find(|p| p.status == PhaseStatus::Running)
            .map(|p| p.id.clone())
        {
            if let Err(e) = expect_transition(
                state,
                &id,
                PhaseStatus::Running,
                PhaseStatus::Cancelled,
                Some(PhaseUpdate::completed(now)),
            ) {
                tracing::warn!(phase = %id, error = %e, "abort could not cancel phase");
            }
        }
        if let Err(e) = skip_remaining(state) {
            tracing::warn!(run = state.run, error = %e, "abort could not skip phases");
        }
        state.finish(status, now);
    }
    release(st);
}

// ── Guard ──

/// Returns the orchestrator to idle if the run future is dropped mid-run.
struct RunGuard<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl<'a> RunGuard<'a> {
    fn new(shared: &'a Shared) -> Self {
        Self {
            shared,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("run dropped before reaching a terminal state");
            let now = self.shared.now();
            self.shared
                .with_state(|st| abort(st, &now, RunStatus::Cancelled));
        }
    }
}
