use crate::state::machine::{transition, PhaseState, PhaseStatus, RunState, RunStatus};
use gitsim_core::error::Result;

/// Derive run-level status from phase states.
pub fn derive_run_status(phases: &[PhaseState]) -> RunStatus {
    if phases.iter().any(|p| p.status == PhaseStatus::Failed) {
        return RunStatus::Failed;
    }
    if phases.iter().any(|p| p.status == PhaseStatus::Cancelled) {
        return RunStatus::Cancelled;
    }
    if phases.iter().all(|p| p.status == PhaseStatus::Passed) {
        return RunStatus::Completed;
    }
    RunStatus::Running
}

/// Mark every still-pending phase as skipped. Returns how many were skipped.
pub fn skip_remaining(state: &mut RunState) -> Result<usize> {
    let pending: Vec<String> = state
        .phases
        .iter()
        .filter(|p| p.status == PhaseStatus::Pending)
        .map(|p| p.id.clone())
        .collect();
    for id in &pending {
        transition(state, id, PhaseStatus::Pending, PhaseStatus::Skipped, None)?;
    }
    Ok(pending.len())
}

/// The phase currently between its delay and its mutation, if any.
pub fn current_phase(state: &RunState) -> Option<&PhaseState> {
    state
        .phases
        .iter()
        .find(|p| p.status == PhaseStatus::Running)
}

pub fn passed_count(state: &RunState) -> usize {
    state
        .phases
        .iter()
        .filter(|p| p.status == PhaseStatus::Passed)
        .count()
}
