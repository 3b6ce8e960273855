//! Plain-text rendering of simulator views.

use gitsim_conductor::state::derive::{current_phase, passed_count};
use gitsim_conductor::{FullEvent, Notifier, RunReport, SimEvent, Snapshot};
use gitsim_core::{
    ClusterState, DeploymentRecord, FileStatus, FileStatusMap, GitOpsAgentState, LogEntry,
    LogLevel, SyncCounts,
};

/// Prints run progress to stdout as it happens.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, event: &FullEvent) {
        if let Some(line) = progress_line(&event.event) {
            println!("{line}");
        }
    }
}

fn progress_line(event: &SimEvent) -> Option<String> {
    match event {
        SimEvent::RunStarted {
            pipeline,
            phase_count,
            target_version,
            ..
        } => Some(format!(
            "▶ {pipeline} → {target_version} ({phase_count} phases)"
        )),
        SimEvent::PhaseStarted {
            phase_id, index, ..
        } => Some(format!("  [{}] {phase_id} …", index + 1)),
        SimEvent::PhasePassed { phase_id, .. } => Some(format!("  ✓ {phase_id}")),
        SimEvent::PhaseFailed {
            phase_id, error, ..
        } => Some(format!("  ✗ {phase_id}: {error}")),
        SimEvent::RunCancelled { phases_passed, .. } => {
            Some(format!("  ⊘ cancelled after {phases_passed} phase(s)"))
        }
        _ => None,
    }
}

pub fn counts(c: &SyncCounts) -> String {
    format!(
        "ahead {}  behind {}  synced {}  total {}",
        c.ahead, c.behind, c.synced, c.total
    )
}

pub fn files(map: &FileStatusMap) -> String {
    let mut out = String::new();
    for (path, status) in map {
        let marker = match status {
            FileStatus::Both => "B",
            FileStatus::Local => "L",
            FileStatus::Remote => "R",
            FileStatus::Clean => " ",
        };
        out.push_str(&format!("  [{marker}] {path}\n"));
    }
    out
}

pub fn cluster(cluster: &ClusterState, agent: &GitOpsAgentState) -> String {
    let mut out = format!(
        "cluster {:?} at {}  (agent {:?}, last sync {})\n",
        cluster.status, cluster.current_version, agent.status, agent.last_sync
    );
    for pod in &cluster.pods {
        out.push_str(&format!("  pod {} {:?}\n", pod.name, pod.status));
    }
    for svc in &cluster.services {
        out.push_str(&format!("  svc {svc}\n"));
    }
    out
}

pub fn history(records: &[DeploymentRecord]) -> String {
    if records.is_empty() {
        return "  (no deployments)\n".to_string();
    }
    records
        .iter()
        .map(|r| {
            format!(
                "  {} {:<8} {} {}\n",
                r.timestamp,
                format!("{:?}", r.status).to_lowercase(),
                r.version,
                r.commit_id
            )
        })
        .collect()
}

pub fn log(entries: &[LogEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            let tag = match e.level {
                LogLevel::Info => "info",
                LogLevel::Warning => "warn",
                LogLevel::Error => "error",
                LogLevel::Success => "ok",
            };
            format!("  {} {tag:<5} {}\n", e.timestamp, e.message)
        })
        .collect()
}

pub fn report(r: &RunReport) -> String {
    format!(
        "{} run #{} {:?}: cluster at {}",
        r.pipeline, r.run, r.status, r.version
    )
}

pub fn status(s: &Snapshot) -> String {
    let mut out = format!("ledger   {}\n", counts(&s.counts));
    out.push_str(&format!("runner   {:?}\n", s.orchestrator));
    if let Some(run) = &s.last_run {
        let phase = current_phase(run).map_or("-", |p| p.id.as_str());
        out.push_str(&format!(
            "last run #{} {} {:?}, {}/{} passed, at {phase}\n",
            run.run,
            run.pipeline,
            run.status,
            passed_count(run),
            run.phases.len()
        ));
    }
    out.push_str(&cluster(&s.cluster, &s.agent));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitsim_conductor::PipelineKind;
    use std::collections::BTreeMap;

    #[test]
    fn file_markers() {
        let mut map = BTreeMap::new();
        map.insert("a.rs".to_string(), FileStatus::Local);
        map.insert("b.rs".to_string(), FileStatus::Clean);
        assert_eq!(files(&map), "  [L] a.rs\n  [ ] b.rs\n");
    }

    #[test]
    fn progress_skips_ledger_events() {
        assert!(progress_line(&SimEvent::SessionReset).is_none());
        let line = progress_line(&SimEvent::PhaseStarted {
            run: 1,
            phase_id: "flag-issue".into(),
            index: 0,
        })
        .unwrap();
        assert!(line.contains("[1] flag-issue"));
    }

    #[test]
    fn report_line() {
        let r = RunReport {
            run: 2,
            pipeline: PipelineKind::Rollback,
            status: gitsim_conductor::RunStatus::Completed,
            version: "v1.0.0".into(),
            record: None,
        };
        assert_eq!(report(&r), "rollback run #2 Completed: cluster at v1.0.0");
    }
}
