use gitsim_core::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::schema::{Pipeline, PipelineKind};

// ── Status enums ──

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Running,
    Passed,
    Failed,
    /// Stopped at a phase boundary before its mutation ran.
    Cancelled,
    /// Never started because an earlier phase failed or was cancelled.
    Skipped,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

// ── State types ──

/// Progress of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Session-wide run sequence number.
    pub run: u64,
    pub pipeline: PipelineKind,
    pub status: RunStatus,
    pub from_version: String,
    pub target_version: String,
    /// Short hash of the commit this run deploys or reverts.
    pub commit_id: String,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    pub phases: Vec<PhaseState>,
    #[serde(default)]
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseState {
    pub id: String,
    pub status: PhaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ── Valid transitions ──

const VALID_TRANSITIONS: &[(PhaseStatus, &[PhaseStatus])] = &[
    (
        PhaseStatus::Pending,
        &[PhaseStatus::Running, PhaseStatus::Skipped],
    ),
    (
        PhaseStatus::Running,
        &[
            PhaseStatus::Passed,
            PhaseStatus::Failed,
            PhaseStatus::Cancelled,
        ],
    ),
    // Passed, Failed, Cancelled and Skipped are terminal
];

fn is_valid_transition(from: PhaseStatus, to: PhaseStatus) -> bool {
    VALID_TRANSITIONS
        .iter()
        .any(|(f, targets)| *f == from && targets.contains(&to))
}

// ── Side effects ──

/// Optional side-effect data applied during a transition.
#[derive(Debug, Clone, Default)]
pub struct PhaseUpdate {
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error: Option<String>,
}

impl PhaseUpdate {
    pub fn started(at: &str) -> Self {
        Self {
            started_at: Some(at.to_string()),
            ..Default::default()
        }
    }

    pub fn completed(at: &str) -> Self {
        Self {
            completed_at: Some(at.to_string()),
            ..Default::default()
        }
    }

    pub fn apply(self, phase: &mut PhaseState) {
        if let Some(v) = self.started_at {
            phase.started_at = Some(v);
        }
        if let Some(v) = self.completed_at {
            phase.completed_at = Some(v);
        }
        if self.error.is_some() {
            phase.error = self.error;
        }
    }
}

// ── CAS-guarded transition ──

/// Transition a phase from `from` to `to`, applying side effects.
/// Returns Ok(true) on success, Ok(false) on CAS miss (current != from).
pub fn transition(
    state: &mut RunState,
    phase_id: &str,
    from: PhaseStatus,
    to: PhaseStatus,
    side_effect: Option<PhaseUpdate>,
) -> Result<bool> {
    let phase = state.get_phase_mut(phase_id)?;
    if phase.status != from {
        return Ok(false); // CAS miss
    }
    if !is_valid_transition(from, to) {
        return Err(EngineError::invariant(format!(
            "invalid transition: {phase_id} {from:?} → {to:?}"
        )));
    }
    phase.status = to;
    if let Some(update) = side_effect {
        update.apply(phase);
    }
    state.version += 1;
    Ok(true)
}

/// Like [`transition`], but a CAS miss is an engine bug.
pub fn expect_transition(
    state: &mut RunState,
    phase_id: &str,
    from: PhaseStatus,
    to: PhaseStatus,
    side_effect: Option<PhaseUpdate>,
) -> Result<()> {
    if transition(state, phase_id, from, to, side_effect)? {
        Ok(())
    } else {
        let current = state.get_phase(phase_id)?.status;
        Err(EngineError::invariant(format!(
            "phase {phase_id} expected {from:?}, found {current:?}"
        )))
    }
}

// ── RunState methods ──

impl RunState {
    /// Fresh run with every phase pending.
    pub fn from_pipeline(
        pipeline: &Pipeline,
        run: u64,
        from_version: &str,
        target_version: &str,
        commit_id: &str,
        started_at: &str,
    ) -> Self {
        let phases = pipeline
            .phases
            .iter()
            .map(|p| PhaseState {
                id: p.id.clone(),
                status: PhaseStatus::Pending,
                started_at: None,
                completed_at: None,
                error: None,
            })
            .collect();

        RunState {
            run,
            pipeline: pipeline.kind,
            status: RunStatus::Running,
            from_version: from_version.to_string(),
            target_version: target_version.to_string(),
            commit_id: commit_id.to_string(),
            started_at: started_at.to_string(),
            finished_at: None,
            phases,
            version: 0,
        }
    }

    pub fn get_phase(&self, id: &str) -> Result<&PhaseState> {
        self.phases
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| EngineError::invariant(format!("phase not found: \"{id}\"")))
    }

    pub fn get_phase_mut(&mut self, id: &str) -> Result<&mut PhaseState> {
        self.phases
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| EngineError::invariant(format!("phase not found: \"{id}\"")))
    }

    /// Close the run with a terminal status.
    pub fn finish(&mut self, status: RunStatus, at: &str) {
        self.status = status;
        self.finished_at = Some(at.to_string());
        self.version += 1;
    }
}
