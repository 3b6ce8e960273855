use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Success,
    Rollback,
    /// A phase failed; the cluster kept the state of the last completed phase.
    Failed,
}

/// Immutable outcome of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub version: String,
    pub timestamp: String,
    pub status: DeploymentStatus,
    pub commit_id: String,
}

/// Grow-only deployment history.
#[derive(Debug, Clone, Default)]
pub struct DeploymentHistory {
    records: Arc<Vec<DeploymentRecord>>,
}

impl DeploymentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: DeploymentRecord) {
        Arc::make_mut(&mut self.records).push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &DeploymentRecord> {
        self.records.iter().rev()
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<&DeploymentRecord> {
        self.records.last()
    }

    #[cfg(test)]
    pub fn count(&self, status: DeploymentStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn reset(&mut self) {
        self.records = Arc::default();
    }
}
