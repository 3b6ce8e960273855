//! State-change notifications for the rendering layer.

use crate::pipeline::schema::PipelineKind;
use gitsim_core::{RejectReason, SyncCounts};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAction {
    CommitLocal,
    Push,
    SimulateRemotePush,
    Pull,
}

/// A simulator event. Serialized as tagged JSON (`"type": "run_started"`, etc.).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    LedgerChanged {
        action: LedgerAction,
        counts: SyncCounts,
    },
    SessionReset,
    RunStarted {
        run: u64,
        pipeline: PipelineKind,
        phase_count: usize,
        target_version: String,
    },
    PhaseStarted {
        run: u64,
        phase_id: String,
        index: usize,
    },
    PhasePassed {
        run: u64,
        phase_id: String,
    },
    PhaseFailed {
        run: u64,
        phase_id: String,
        error: String,
    },
    RunCompleted {
        run: u64,
        pipeline: PipelineKind,
        version: String,
    },
    RunFailed {
        run: u64,
        pipeline: PipelineKind,
        phase_id: String,
    },
    RunCancelled {
        run: u64,
        pipeline: PipelineKind,
        phases_passed: usize,
    },
    RunRejected {
        pipeline: PipelineKind,
        reason: RejectReason,
    },
}

impl SimEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            SimEvent::LedgerChanged { .. } => "ledger_changed",
            SimEvent::SessionReset => "session_reset",
            SimEvent::RunStarted { .. } => "run_started",
            SimEvent::PhaseStarted { .. } => "phase_started",
            SimEvent::PhasePassed { .. } => "phase_passed",
            SimEvent::PhaseFailed { .. } => "phase_failed",
            SimEvent::RunCompleted { .. } => "run_completed",
            SimEvent::RunFailed { .. } => "run_failed",
            SimEvent::RunCancelled { .. } => "run_cancelled",
            SimEvent::RunRejected { .. } => "run_rejected",
        }
    }
}

/// Wrapper that adds sequence number and timestamp to each event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullEvent {
    pub seq: u64,
    pub ts: String,
    #[serde(flatten)]
    pub event: SimEvent,
}
