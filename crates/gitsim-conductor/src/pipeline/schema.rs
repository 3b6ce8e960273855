use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The two orchestrated workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    FeatureDeployment,
    Rollback,
}

impl PipelineKind {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineKind::FeatureDeployment => "feature-deployment",
            PipelineKind::Rollback => "rollback",
        }
    }

    /// Effect that must close a pipeline of this kind.
    pub fn terminal_effect(&self) -> PhaseEffect {
        match self {
            PipelineKind::FeatureDeployment => PhaseEffect::ApplyAndSync,
            PipelineKind::Rollback => PhaseEffect::ApplyRollback,
        }
    }

    /// Built-in phase list.
    pub fn pipeline(&self) -> Pipeline {
        match self {
            PipelineKind::FeatureDeployment => Pipeline::feature_deployment(),
            PipelineKind::Rollback => Pipeline::rollback(),
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State mutation a phase applies once its delay has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseEffect {
    CreateBranch,
    CommitChange,
    MergeToMain,
    /// Agent → syncing, cluster → progressing.
    AgentDetectsChange,
    /// Cluster moves to the target version; `success` record.
    ApplyAndSync,
    FlagIssue,
    /// Agent → syncing.
    RevertCommit,
    /// Cluster → progressing.
    AgentDetectsRevert,
    /// Cluster back to baseline; `rollback` record.
    ApplyRollback,
}

impl PhaseEffect {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseEffect::ApplyAndSync | PhaseEffect::ApplyRollback)
    }
}

/// One ordered step of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// Kebab-case id, unique within the pipeline.
    pub id: String,
    pub title: String,
    pub effect: PhaseEffect,
    /// Overrides the session-wide phase delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl Phase {
    fn new(id: &str, title: &str, effect: PhaseEffect) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            effect,
            delay_ms: None,
        }
    }

    pub fn delay(&self, default_ms: u64) -> Duration {
        Duration::from_millis(self.delay_ms.unwrap_or(default_ms))
    }
}

/// Fixed, ordered phase list driven by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub kind: PipelineKind,
    pub phases: Vec<Phase>,
}

impl Pipeline {
    pub fn feature_deployment() -> Self {
        Self {
            kind: PipelineKind::FeatureDeployment,
            phases: vec![
                Phase::new("create-branch", "Create feature branch", PhaseEffect::CreateBranch),
                Phase::new("commit-change", "Commit the change", PhaseEffect::CommitChange),
                Phase::new("merge-to-main", "Merge into main", PhaseEffect::MergeToMain),
                Phase::new(
                    "agent-detects-change",
                    "GitOps agent detects the change",
                    PhaseEffect::AgentDetectsChange,
                ),
                Phase::new(
                    "apply-and-sync",
                    "Apply manifests and sync",
                    PhaseEffect::ApplyAndSync,
                ),
            ],
        }
    }

    pub fn rollback() -> Self {
        Self {
            kind: PipelineKind::Rollback,
            phases: vec![
                Phase::new("flag-issue", "Flag the issue", PhaseEffect::FlagIssue),
                Phase::new("revert-commit", "Revert the commit", PhaseEffect::RevertCommit),
                Phase::new(
                    "agent-detects-revert",
                    "GitOps agent detects the revert",
                    PhaseEffect::AgentDetectsRevert,
                ),
                Phase::new("apply-rollback", "Apply the rollback", PhaseEffect::ApplyRollback),
            ],
        }
    }

    pub fn phase(&self, id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }

    /// Set a per-phase delay override. Unknown ids are ignored.
    pub fn with_delay(mut self, phase_id: &str, delay_ms: u64) -> Self {
        if let Some(p) = self.phases.iter_mut().find(|p| p.id == phase_id) {
            p.delay_ms = Some(delay_ms);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_deployment_phase_order() {
        let p = Pipeline::feature_deployment();
        let ids: Vec<&str> = p.phases.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "create-branch",
                "commit-change",
                "merge-to-main",
                "agent-detects-change",
                "apply-and-sync"
            ]
        );
        assert_eq!(p.phases.last().unwrap().effect, p.kind.terminal_effect());
    }

    #[test]
    fn rollback_phase_order() {
        let p = Pipeline::rollback();
        let ids: Vec<&str> = p.phases.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "flag-issue",
                "revert-commit",
                "agent-detects-revert",
                "apply-rollback"
            ]
        );
        assert!(p.phases.last().unwrap().effect.is_terminal());
    }

    #[test]
    fn delay_override() {
        let p = Pipeline::rollback().with_delay("flag-issue", 5);
        assert_eq!(p.phase("flag-issue").unwrap().delay(800), Duration::from_millis(5));
        assert_eq!(p.phase("revert-commit").unwrap().delay(800), Duration::from_millis(800));
    }

    #[test]
    fn kind_names() {
        assert_eq!(PipelineKind::FeatureDeployment.to_string(), "feature-deployment");
        assert_eq!(PipelineKind::Rollback.pipeline(), Pipeline::rollback());
    }
}
