use crate::config::SimConfig;
use crate::types::BASELINE_TS;
use serde::{Deserialize, Serialize};

// ── ClusterState ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStatus {
    Healthy,
    /// The agent has seen a change the cluster has not applied yet.
    Progressing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodStatus {
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub name: String,
    pub status: PodStatus,
    pub version: String,
}

/// Simulated deployment target.
///
/// Version changes swap the whole pod set at once; no progressive rollout
/// is modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    pub status: ClusterStatus,
    pub pods: Vec<Pod>,
    pub services: Vec<String>,
    pub current_version: String,
}

impl ClusterState {
    pub fn baseline(config: &SimConfig) -> Self {
        Self {
            status: ClusterStatus::Healthy,
            pods: pods_for(&config.app_name, &config.baseline_version, config.replicas),
            services: config.services.clone(),
            current_version: config.baseline_version.clone(),
        }
    }

    /// New state running `version` on a fresh pod set.
    pub fn with_version(&self, version: &str, config: &SimConfig) -> Self {
        Self {
            status: ClusterStatus::Healthy,
            pods: pods_for(&config.app_name, version, config.replicas),
            services: self.services.clone(),
            current_version: version.to_string(),
        }
    }

    pub fn with_status(&self, status: ClusterStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

fn pods_for(app: &str, version: &str, replicas: usize) -> Vec<Pod> {
    let slug = version.replace('.', "-");
    (1..=replicas)
        .map(|i| Pod {
            name: format!("{app}-{slug}-{i}"),
            status: PodStatus::Running,
            version: version.to_string(),
        })
        .collect()
}

/// Next major version: `v1.0.0` → `v2.0.0`. Unparseable input gets a
/// `-next` suffix rather than failing.
pub fn next_major_version(version: &str) -> String {
    let (prefix, rest) = match version.strip_prefix('v') {
        Some(rest) => ("v", rest),
        None => ("", version),
    };
    let major = rest.split('.').next().and_then(|m| m.parse::<u64>().ok());
    match major {
        Some(major) => format!("{prefix}{}.0.0", major + 1),
        None => format!("{version}-next"),
    }
}

// ── GitOpsAgentState ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Watching,
    Syncing,
    Synced,
}

/// Simulated watcher/syncer reconciling the cluster against main.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitOpsAgentState {
    pub status: AgentStatus,
    pub last_sync: String,
    pub auto_sync: bool,
}

impl Default for GitOpsAgentState {
    fn default() -> Self {
        Self::baseline()
    }
}

impl GitOpsAgentState {
    pub fn baseline() -> Self {
        Self {
            status: AgentStatus::Watching,
            last_sync: BASELINE_TS.to_string(),
            auto_sync: true,
        }
    }

    pub fn syncing(&self) -> Self {
        Self {
            status: AgentStatus::Syncing,
            ..self.clone()
        }
    }

    pub fn synced(&self, at: &str) -> Self {
        Self {
            status: AgentStatus::Synced,
            last_sync: at.to_string(),
            auto_sync: self.auto_sync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_cluster() {
        let config = SimConfig::default();
        let cluster = ClusterState::baseline(&config);
        assert_eq!(cluster.current_version, "v1.0.0");
        assert_eq!(cluster.pods.len(), 3);
        assert_eq!(cluster.pods[0].name, "web-v1-0-0-1");
        assert!(cluster.pods.iter().all(|p| p.version == "v1.0.0"));
        assert_eq!(cluster.status, ClusterStatus::Healthy);
    }

    #[test]
    fn version_change_replaces_every_pod() {
        let config = SimConfig::default();
        let before = ClusterState::baseline(&config).with_status(ClusterStatus::Progressing);
        let after = before.with_version("v2.0.0", &config);

        assert_eq!(after.current_version, "v2.0.0");
        assert_eq!(after.status, ClusterStatus::Healthy);
        assert!(after.pods.iter().all(|p| p.version == "v2.0.0"));
        assert!(after
            .pods
            .iter()
            .all(|p| !before.pods.iter().any(|old| old.name == p.name)));
        assert_eq!(before.current_version, "v1.0.0");
    }

    #[test]
    fn next_major() {
        assert_eq!(next_major_version("v1.0.0"), "v2.0.0");
        assert_eq!(next_major_version("v2.3.4"), "v3.0.0");
        assert_eq!(next_major_version("7.1.0"), "8.0.0");
        assert_eq!(next_major_version("latest"), "latest-next");
    }

    #[test]
    fn agent_transitions() {
        let agent = GitOpsAgentState::baseline();
        assert_eq!(agent.status, AgentStatus::Watching);

        let syncing = agent.syncing();
        assert_eq!(syncing.status, AgentStatus::Syncing);
        assert_eq!(syncing.last_sync, BASELINE_TS);

        let synced = syncing.synced("2025-06-01T12:00:00Z");
        assert_eq!(synced.status, AgentStatus::Synced);
        assert_eq!(synced.last_sync, "2025-06-01T12:00:00Z");
        assert!(synced.auto_sync);
    }
}
