//! Per-phase state mutations. Applied under the session lock, after the
//! phase delay has elapsed.

use crate::pipeline::schema::{Phase, PhaseEffect};
use crate::session::SessionState;
use crate::state::machine::RunState;
use gitsim_core::{ClusterStatus, DeploymentRecord, DeploymentStatus, LogLevel, SimConfig};

/// Immutable facts about the active run, copied out of [`RunState`] so
/// effects can mutate the session freely.
#[derive(Debug, Clone)]
pub(crate) struct RunContext {
    pub from_version: String,
    pub target_version: String,
    pub commit_id: String,
}

impl RunContext {
    pub fn of(run: &RunState) -> Self {
        Self {
            from_version: run.from_version.clone(),
            target_version: run.target_version.clone(),
            commit_id: run.commit_id.clone(),
        }
    }

    fn branch(&self) -> String {
        format!("feature/release-{}", self.target_version)
    }
}

/// Apply `phase`'s effect. Returns the deployment record it wrote, if any.
pub(crate) fn apply(
    st: &mut SessionState,
    config: &SimConfig,
    ctx: &RunContext,
    phase: &Phase,
    now: &str,
) -> Option<DeploymentRecord> {
    match phase.effect {
        PhaseEffect::CreateBranch => {
            st.log(LogLevel::Info, format!("Created branch {}", ctx.branch()), now);
        }
        PhaseEffect::CommitChange => {
            st.log(
                LogLevel::Info,
                format!(
                    "Committed {} on {}: bump {} image to {}",
                    ctx.commit_id,
                    ctx.branch(),
                    config.app_name,
                    ctx.target_version
                ),
                now,
            );
        }
        PhaseEffect::MergeToMain => {
            st.log(
                LogLevel::Success,
                format!("Merged {} into main", ctx.branch()),
                now,
            );
        }
        PhaseEffect::AgentDetectsChange => {
            st.agent = st.agent.syncing();
            st.cluster = st.cluster.with_status(ClusterStatus::Progressing);
            st.log(
                LogLevel::Info,
                format!("GitOps agent detected {} on main, syncing", ctx.commit_id),
                now,
            );
        }
        PhaseEffect::ApplyAndSync => {
            return Some(sync_to(st, config, ctx, now, DeploymentStatus::Success));
        }
        PhaseEffect::FlagIssue => {
            st.log(
                LogLevel::Warning,
                format!("Issue flagged in {}: error rate above threshold", ctx.from_version),
                now,
            );
        }
        PhaseEffect::RevertCommit => {
            st.agent = st.agent.syncing();
            st.log(
                LogLevel::Info,
                format!("Pushed revert {} to main", ctx.commit_id),
                now,
            );
        }
        PhaseEffect::AgentDetectsRevert => {
            st.cluster = st.cluster.with_status(ClusterStatus::Progressing);
            st.log(
                LogLevel::Info,
                format!(
                    "GitOps agent detected revert {}, target {}",
                    ctx.commit_id, ctx.target_version
                ),
                now,
            );
        }
        PhaseEffect::ApplyRollback => {
            return Some(sync_to(st, config, ctx, now, DeploymentStatus::Rollback));
        }
    }
    None
}

/// Swap the pod set to the target version and record the outcome.
fn sync_to(
    st: &mut SessionState,
    config: &SimConfig,
    ctx: &RunContext,
    now: &str,
    status: DeploymentStatus,
) -> DeploymentRecord {
    st.cluster = st.cluster.with_version(&ctx.target_version, config);
    st.agent = st.agent.synced(now);
    let record = DeploymentRecord {
        version: ctx.target_version.clone(),
        timestamp: now.to_string(),
        status,
        commit_id: ctx.commit_id.clone(),
    };
    st.history.record(record.clone());

    let verb = match status {
        DeploymentStatus::Rollback => "Rolled back to",
        _ => "Deployed",
    };
    st.log(
        LogLevel::Success,
        format!(
            "{verb} {} ({} pods running), agent synced",
            ctx.target_version,
            st.cluster.pods.len()
        ),
        now,
    );
    record
}
