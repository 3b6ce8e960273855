//! The simulator session: owns every component and exposes the actions the
//! rendering layer calls.
//!
//! All state sits behind one mutex that is never held across an `.await`,
//! so every action and every phase mutation is atomic relative to readers.
//! Notifications are collected while the lock is held and delivered after
//! it is released.

use crate::pipeline::parser::validate_pipeline;
use crate::pipeline::schema::{Pipeline, PipelineKind};
use crate::runner::delay::{Delay, TokioDelay};
use crate::runner::event::{FullEvent, LedgerAction, SimEvent};
use crate::runner::fault::{FaultInjector, NoFaults};
use crate::runner::notify::{Notifier, TracingNotifier};
use crate::runner::orchestrator;
use crate::state::machine::{RunState, RunStatus};
use anyhow::Context;
use gitsim_core::error::{EngineError, Result};
use gitsim_core::{
    ActivityLog, Clock, ClusterState, Commit, CommitLedger, DeploymentHistory, DeploymentRecord,
    FileChangeTracker, FileStatusMap, GitOpsAgentState, LedgerOutcome, LogEntry, LogLevel,
    SimConfig, SyncCounts, SystemClock,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

const DEFAULT_LOCAL_FILES: &[&str] = &["src/main.rs"];
const DEFAULT_REMOTE_FILES: &[&str] = &["README.md"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorStatus {
    Idle,
    Running,
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run: u64,
    pub pipeline: PipelineKind,
    pub status: RunStatus,
    /// Cluster version once the run stopped.
    pub version: String,
    pub record: Option<DeploymentRecord>,
}

/// Every read-only view, taken under a single lock.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub commits: Arc<Vec<Commit>>,
    pub counts: SyncCounts,
    pub files: Arc<FileStatusMap>,
    pub cluster: ClusterState,
    pub agent: GitOpsAgentState,
    /// Newest first.
    pub history: Vec<DeploymentRecord>,
    /// Newest first.
    pub log: Vec<LogEntry>,
    pub orchestrator: OrchestratorStatus,
    pub last_run: Option<RunState>,
}

// ── Session state ──

pub(crate) struct SessionState {
    pub(crate) ledger: CommitLedger,
    pub(crate) tracker: FileChangeTracker,
    pub(crate) log: ActivityLog,
    pub(crate) cluster: ClusterState,
    pub(crate) agent: GitOpsAgentState,
    pub(crate) history: DeploymentHistory,
    pub(crate) status: OrchestratorStatus,
    pub(crate) last_run: Option<RunState>,
    pub(crate) cancel: Option<CancellationToken>,
    pub(crate) run_seq: u64,
    local_seq: u64,
    remote_seq: u64,
    event_seq: u64,
    outbox: Vec<FullEvent>,
}

impl SessionState {
    fn new(config: &SimConfig) -> Self {
        Self {
            ledger: CommitLedger::seeded(),
            tracker: FileChangeTracker::new(),
            log: ActivityLog::new(config.log_capacity),
            cluster: ClusterState::baseline(config),
            agent: GitOpsAgentState::baseline(),
            history: DeploymentHistory::new(),
            status: OrchestratorStatus::Idle,
            last_run: None,
            cancel: None,
            run_seq: 0,
            local_seq: 0,
            remote_seq: 0,
            event_seq: 0,
            outbox: Vec::new(),
        }
    }

    /// Queue a notification; delivered once the lock is released.
    pub(crate) fn emit(&mut self, ts: &str, event: SimEvent) {
        self.outbox.push(FullEvent {
            seq: self.event_seq,
            ts: ts.to_string(),
            event,
        });
        self.event_seq += 1;
    }

    pub(crate) fn log(&mut self, level: LogLevel, message: impl Into<String>, ts: &str) {
        self.log.append(level, message, ts);
    }

    /// Re-check the ledger invariant and refresh the derived file view.
    fn after_ledger_change(&mut self) -> Result<SyncCounts> {
        let counts = self.ledger.verify()?;
        self.tracker.statuses(&self.ledger);
        Ok(counts)
    }

    fn reset(&mut self, config: &SimConfig) {
        self.ledger.reset();
        self.tracker.statuses(&self.ledger);
        self.log.reset();
        self.cluster = ClusterState::baseline(config);
        self.agent = GitOpsAgentState::baseline();
        self.history.reset();
        self.last_run = None;
        self.cancel = None;
        self.run_seq = 0;
        self.local_seq = 0;
        self.remote_seq = 0;
    }
}

// ── Shared core ──

pub(crate) struct Shared {
    pub(crate) config: SimConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) delay: Arc<dyn Delay>,
    pub(crate) faults: Arc<dyn FaultInjector>,
    notifier: Arc<dyn Notifier>,
    pipelines: HashMap<PipelineKind, Pipeline>,
    state: Mutex<SessionState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` under the state lock, then deliver queued notifications.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let (out, events) = {
            let mut st = self.lock();
            let out = f(&mut st);
            (out, std::mem::take(&mut st.outbox))
        };
        for event in &events {
            self.notifier.notify(event);
        }
        out
    }

    pub(crate) fn now(&self) -> String {
        self.clock.now_rfc3339()
    }

    pub(crate) fn pipeline(&self, kind: PipelineKind) -> Pipeline {
        self.pipelines
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| kind.pipeline())
    }
}

// ── Builder ──

pub struct SimulatorBuilder {
    config: SimConfig,
    clock: Arc<dyn Clock>,
    delay: Arc<dyn Delay>,
    faults: Arc<dyn FaultInjector>,
    notifier: Arc<dyn Notifier>,
    pipelines: HashMap<PipelineKind, Pipeline>,
}

impl SimulatorBuilder {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config: config.normalized(),
            clock: Arc::new(SystemClock),
            delay: Arc::new(TokioDelay),
            faults: Arc::new(NoFaults),
            notifier: Arc::new(TracingNotifier),
            pipelines: HashMap::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_faults(mut self, faults: Arc<dyn FaultInjector>) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the built-in pipeline of the same kind.
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipelines.insert(pipeline.kind, pipeline);
        self
    }

    /// Validate pipeline overrides and build the session.
    pub fn build(self) -> anyhow::Result<Simulator> {
        for pipeline in self.pipelines.values() {
            validate_pipeline(pipeline)
                .with_context(|| format!("invalid {} pipeline", pipeline.kind))?;
        }
        Ok(self.into_simulator())
    }

    fn into_simulator(self) -> Simulator {
        let state = SessionState::new(&self.config);
        Simulator {
            shared: Arc::new(Shared {
                config: self.config,
                clock: self.clock,
                delay: self.delay,
                faults: self.faults,
                notifier: self.notifier,
                pipelines: self.pipelines,
                state: Mutex::new(state),
            }),
        }
    }
}

// ── Simulator ──

/// One simulator session. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Simulator {
    shared: Arc<Shared>,
}

impl Simulator {
    /// Session with built-in pipelines, real delays and no faults.
    pub fn new(config: SimConfig) -> Self {
        SimulatorBuilder::new(config).into_simulator()
    }

    pub fn builder(config: SimConfig) -> SimulatorBuilder {
        SimulatorBuilder::new(config)
    }

    pub fn config(&self) -> &SimConfig {
        &self.shared.config
    }

    // ── Ledger actions ──

    /// Commit in the local working copy. `None` arguments use defaults.
    pub fn commit_local(&self, message: Option<&str>, files: Option<Vec<String>>) -> Result<Commit> {
        let now = self.shared.now();
        self.shared.with_state(|st| {
            st.local_seq += 1;
            let message = message
                .map(str::to_string)
                .unwrap_or_else(|| format!("Local change #{}", st.local_seq));
            let files = files.unwrap_or_else(|| to_strings(DEFAULT_LOCAL_FILES));
            let commit = st.ledger.append_local(&message, files, &now);
            let counts = st.after_ledger_change()?;
            st.log(
                LogLevel::Info,
                format!(
                    "Committed {} locally: \"{}\" ({} ahead of origin/main)",
                    commit.id, commit.message, counts.ahead
                ),
                &now,
            );
            st.emit(
                &now,
                SimEvent::LedgerChanged {
                    action: LedgerAction::CommitLocal,
                    counts,
                },
            );
            Ok(commit)
        })
    }

    /// Publish every local-only commit.
    pub fn push(&self) -> Result<LedgerOutcome> {
        let now = self.shared.now();
        self.shared.with_state(|st| {
            let outcome = st.ledger.push();
            match outcome {
                LedgerOutcome::Applied { count } => {
                    let counts = st.after_ledger_change()?;
                    st.log(
                        LogLevel::Success,
                        format!("Pushed {count} commit(s) to origin/main"),
                        &now,
                    );
                    st.emit(
                        &now,
                        SimEvent::LedgerChanged {
                            action: LedgerAction::Push,
                            counts,
                        },
                    );
                }
                LedgerOutcome::NoOp => {
                    st.log(LogLevel::Info, "Nothing to push: local is not ahead", &now);
                }
            }
            Ok(outcome)
        })
    }

    /// A teammate pushes to the remote.
    pub fn simulate_remote_push(
        &self,
        message: Option<&str>,
        files: Option<Vec<String>>,
    ) -> Result<Commit> {
        let now = self.shared.now();
        self.shared.with_state(|st| {
            st.remote_seq += 1;
            let message = message
                .map(str::to_string)
                .unwrap_or_else(|| format!("Teammate change #{}", st.remote_seq));
            let files = files.unwrap_or_else(|| to_strings(DEFAULT_REMOTE_FILES));
            let commit = st.ledger.append_remote(&message, files, &now);
            let counts = st.after_ledger_change()?;
            st.log(
                LogLevel::Warning,
                format!(
                    "Remote moved: {} pushed {} \"{}\" ({} behind)",
                    commit.author, commit.id, commit.message, counts.behind
                ),
                &now,
            );
            st.emit(
                &now,
                SimEvent::LedgerChanged {
                    action: LedgerAction::SimulateRemotePush,
                    counts,
                },
            );
            Ok(commit)
        })
    }

    /// Fetch every remote-only commit.
    pub fn pull(&self) -> Result<LedgerOutcome> {
        let now = self.shared.now();
        self.shared.with_state(|st| {
            let outcome = st.ledger.pull();
            match outcome {
                LedgerOutcome::Applied { count } => {
                    let counts = st.after_ledger_change()?;
                    st.log(
                        LogLevel::Success,
                        format!("Pulled {count} commit(s) from origin/main"),
                        &now,
                    );
                    st.emit(
                        &now,
                        SimEvent::LedgerChanged {
                            action: LedgerAction::Pull,
                            counts,
                        },
                    );
                }
                LedgerOutcome::NoOp => {
                    st.log(LogLevel::Info, "Already up to date", &now);
                }
            }
            Ok(outcome)
        })
    }

    /// Restore every component to its seeded baseline.
    pub fn reset(&self) -> Result<()> {
        let now = self.shared.now();
        let config = &self.shared.config;
        self.shared.with_state(|st| {
            if st.status == OrchestratorStatus::Running {
                tracing::warn!("reset rejected while a run is active");
                return Err(EngineError::ResetWhileRunning);
            }
            st.reset(config);
            st.emit(&now, SimEvent::SessionReset);
            Ok(())
        })
    }

    // ── Orchestrator actions ──

    pub async fn run_feature_deployment(&self) -> Result<RunReport> {
        self.run(PipelineKind::FeatureDeployment).await
    }

    pub async fn run_rollback(&self) -> Result<RunReport> {
        self.run(PipelineKind::Rollback).await
    }

    pub async fn run(&self, kind: PipelineKind) -> Result<RunReport> {
        orchestrator::run_pipeline(&self.shared, kind).await
    }

    /// Ask the active run to stop at its next phase boundary.
    /// Returns false when nothing is running.
    pub fn cancel_run(&self) -> bool {
        self.shared.with_state(|st| match &st.cancel {
            Some(token) if st.status == OrchestratorStatus::Running => {
                token.cancel();
                true
            }
            _ => false,
        })
    }

    // ── Views ──

    pub fn commits(&self) -> Arc<Vec<Commit>> {
        self.shared.with_state(|st| st.ledger.shared())
    }

    pub fn counts(&self) -> SyncCounts {
        self.shared.with_state(|st| st.ledger.counts())
    }

    pub fn file_statuses(&self) -> Arc<FileStatusMap> {
        self.shared
            .with_state(|st| st.tracker.statuses(&st.ledger))
    }

    pub fn cluster(&self) -> ClusterState {
        self.shared.with_state(|st| st.cluster.clone())
    }

    pub fn agent(&self) -> GitOpsAgentState {
        self.shared.with_state(|st| st.agent.clone())
    }

    /// Deployment records, newest first.
    pub fn history(&self) -> Vec<DeploymentRecord> {
        self.shared
            .with_state(|st| st.history.newest_first().cloned().collect())
    }

    /// Activity log, newest first.
    pub fn log(&self) -> Vec<LogEntry> {
        self.shared
            .with_state(|st| st.log.newest_first().cloned().collect())
    }

    pub fn status(&self) -> OrchestratorStatus {
        self.shared.with_state(|st| st.status)
    }

    pub fn last_run(&self) -> Option<RunState> {
        self.shared.with_state(|st| st.last_run.clone())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shared.with_state(|st| Snapshot {
            commits: st.ledger.shared(),
            counts: st.ledger.counts(),
            files: st.tracker.statuses(&st.ledger),
            cluster: st.cluster.clone(),
            agent: st.agent.clone(),
            history: st.history.newest_first().cloned().collect(),
            log: st.log.newest_first().cloned().collect(),
            orchestrator: st.status,
            last_run: st.last_run.clone(),
        })
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::delay::InstantDelay;
    use crate::runner::notify::CollectNotifier;
    use gitsim_core::{FileStatus, ManualClock};

    fn sim() -> (Simulator, Arc<CollectNotifier>) {
        let notifier = Arc::new(CollectNotifier::new());
        let sim = Simulator::builder(SimConfig::default())
            .with_clock(Arc::new(ManualClock::at_epoch()))
            .with_delay(Arc::new(InstantDelay::new()))
            .with_notifier(notifier.clone())
            .build()
            .unwrap();
        (sim, notifier)
    }

    #[test]
    fn seeded_session() {
        let (sim, _) = sim();
        assert_eq!(
            sim.counts(),
            SyncCounts {
                ahead: 0,
                behind: 0,
                synced: 5,
                total: 5
            }
        );
        assert_eq!(sim.log().len(), 2);
        assert_eq!(sim.cluster().current_version, "v1.0.0");
        assert!(sim.history().is_empty());
        assert_eq!(sim.status(), OrchestratorStatus::Idle);
    }

    #[test]
    fn ledger_scenario() {
        let (sim, _) = sim();
        sim.commit_local(None, None).unwrap();
        sim.commit_local(Some("second"), None).unwrap();
        assert_eq!(sim.counts().ahead, 2);

        assert_eq!(sim.push().unwrap(), LedgerOutcome::Applied { count: 2 });
        let c = sim.counts();
        assert_eq!((c.ahead, c.synced), (0, 7));

        sim.simulate_remote_push(None, None).unwrap();
        assert_eq!(sim.counts().behind, 1);

        assert_eq!(sim.pull().unwrap(), LedgerOutcome::Applied { count: 1 });
        let c = sim.counts();
        assert_eq!((c.behind, c.synced, c.total), (0, 8, 8));
    }

    #[test]
    fn commit_local_defaults() {
        let (sim, _) = sim();
        let c = sim.commit_local(None, None).unwrap();
        assert!(c.local && !c.remote);
        assert_eq!(c.message, "Local change #1");
        assert_eq!(c.changed_files, vec!["src/main.rs".to_string()]);
        assert_eq!(c.timestamp, "1970-01-01T00:00:00Z");
    }

    #[test]
    fn remote_push_defaults() {
        let (sim, _) = sim();
        let c = sim
            .simulate_remote_push(Some("docs"), Some(vec!["docs/a.md".into()]))
            .unwrap();
        assert!(!c.local && c.remote);
        assert_eq!(c.author, gitsim_core::REMOTE_AUTHOR);
        assert_eq!(sim.file_statuses()["docs/a.md"], FileStatus::Remote);
    }

    #[test]
    fn noop_push_and_pull_log_but_do_not_mutate() {
        let (sim, notifier) = sim();
        let before = sim.commits();
        let log_before = sim.log().len();

        assert_eq!(sim.push().unwrap(), LedgerOutcome::NoOp);
        assert_eq!(sim.pull().unwrap(), LedgerOutcome::NoOp);

        assert!(Arc::ptr_eq(&before, &sim.commits()));
        assert_eq!(sim.log().len(), log_before + 2);
        assert_eq!(sim.log()[0].message, "Already up to date");
        assert!(notifier.events().is_empty());
    }

    #[test]
    fn file_statuses_follow_the_ledger() {
        let (sim, _) = sim();
        sim.commit_local(None, Some(vec!["shared.rs".into(), "mine.rs".into()]))
            .unwrap();
        sim.simulate_remote_push(None, Some(vec!["shared.rs".into()]))
            .unwrap();
        let files = sim.file_statuses();
        assert_eq!(files["shared.rs"], FileStatus::Both);
        assert_eq!(files["mine.rs"], FileStatus::Local);
        assert_eq!(files["README.md"], FileStatus::Clean);

        sim.push().unwrap();
        sim.pull().unwrap();
        assert!(sim
            .file_statuses()
            .values()
            .all(|s| *s == FileStatus::Clean));
    }

    #[test]
    fn ledger_changes_notify_in_sequence() {
        let (sim, notifier) = sim();
        sim.commit_local(None, None).unwrap();
        sim.push().unwrap();
        sim.simulate_remote_push(None, None).unwrap();
        sim.pull().unwrap();

        let events = notifier.events();
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
        assert!(matches!(
            events[3].event,
            SimEvent::LedgerChanged {
                action: LedgerAction::Pull,
                ..
            }
        ));
    }

    #[test]
    fn reset_restores_baseline_exactly() {
        let (sim, notifier) = sim();
        let baseline = sim.snapshot();

        sim.commit_local(None, None).unwrap();
        sim.simulate_remote_push(None, None).unwrap();
        sim.reset().unwrap();

        let after = sim.snapshot();
        assert_eq!(*after.commits, *baseline.commits);
        assert_eq!(after.counts, baseline.counts);
        assert_eq!(after.log, baseline.log);
        assert_eq!(after.cluster, baseline.cluster);
        assert_eq!(after.agent, baseline.agent);
        assert_eq!(after.history, baseline.history);
        assert_eq!(*after.files, *baseline.files);
        assert_eq!(notifier.types().last(), Some(&"session_reset"));

        // id sequence restarts
        let c = sim.commit_local(None, None).unwrap();
        assert_eq!(c.id.0, 6);
        assert_eq!(c.message, "Local change #1");
    }

    #[tokio::test]
    async fn reset_after_runs_restores_baseline() {
        let (sim, _) = sim();
        let baseline = sim.snapshot();

        sim.run_feature_deployment().await.unwrap();
        sim.run_feature_deployment().await.unwrap();
        sim.run_rollback().await.unwrap();
        sim.run_feature_deployment().await.unwrap();
        assert_eq!(sim.history().len(), 4);
        assert_eq!(sim.cluster().current_version, "v2.0.0");

        sim.reset().unwrap();

        let after = sim.snapshot();
        assert_eq!(after.cluster, baseline.cluster);
        assert_eq!(after.agent, baseline.agent);
        assert_eq!(after.history, baseline.history);
        assert_eq!(after.log, baseline.log);
        assert!(after.last_run.is_none());
        assert_eq!(after.orchestrator, OrchestratorStatus::Idle);

        // run numbering restarts too
        let report = sim.run_feature_deployment().await.unwrap();
        assert_eq!(report.run, 1);
        assert_eq!(report.version, "v2.0.0");
    }

    #[test]
    fn cancel_without_run_is_noop() {
        let (sim, _) = sim();
        assert!(!sim.cancel_run());
    }

    #[test]
    fn invalid_pipeline_override_fails_build() {
        let mut broken = Pipeline::rollback();
        broken.phases.pop();
        let err = Simulator::builder(SimConfig::default())
            .with_pipeline(broken)
            .build()
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("invalid rollback pipeline"));
    }

    #[test]
    fn snapshot_serializes() {
        let (sim, _) = sim();
        let json = serde_json::to_value(sim.snapshot()).unwrap();
        assert_eq!(json["counts"]["synced"], 5);
        assert_eq!(json["orchestrator"], "idle");
        assert_eq!(json["cluster"]["current_version"], "v1.0.0");
    }
}
