use crate::error::{EngineError, Result};
use crate::types::{CommitId, Presence, BASELINE_TS, LOCAL_AUTHOR, REMOTE_AUTHOR};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single commit record. Never mutated once published in a ledger value;
/// flag changes produce a new collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub message: String,
    pub author: String,
    pub timestamp: String,
    pub local: bool,
    pub remote: bool,
    pub changed_files: Vec<String>,
}

impl Commit {
    pub fn presence(&self) -> Option<Presence> {
        Presence::from_flags(self.local, self.remote)
    }

    pub fn is_ahead(&self) -> bool {
        self.local && !self.remote
    }

    pub fn is_behind(&self) -> bool {
        self.remote && !self.local
    }

    pub fn is_synced(&self) -> bool {
        self.local && self.remote
    }
}

/// Derived ahead/behind/synced counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub ahead: usize,
    pub behind: usize,
    pub synced: usize,
    pub total: usize,
}

impl SyncCounts {
    pub fn is_consistent(&self) -> bool {
        self.ahead + self.behind + self.synced == self.total
    }
}

/// Outcome of push/pull. Nothing to transfer is informational, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LedgerOutcome {
    Applied { count: usize },
    NoOp,
}

// ── Seed ──

const SEED: &[(&str, &[&str])] = &[
    ("Initial commit", &["README.md"]),
    ("Add project skeleton", &["src/main.rs", "Cargo.toml"]),
    ("Add CI workflow", &[".github/workflows/ci.yml"]),
    (
        "Add deployment manifests",
        &["k8s/deployment.yaml", "k8s/service.yaml"],
    ),
    ("Configure GitOps agent", &["gitops/application.yaml"]),
];

fn seed_commits() -> Vec<Commit> {
    SEED.iter()
        .enumerate()
        .map(|(i, (message, files))| Commit {
            id: CommitId(i as u64 + 1),
            message: (*message).to_string(),
            author: (if i % 2 == 0 { LOCAL_AUTHOR } else { REMOTE_AUTHOR }).to_string(),
            timestamp: BASELINE_TS.to_string(),
            local: true,
            remote: true,
            changed_files: files.iter().map(|f| f.to_string()).collect(),
        })
        .collect()
}

// ── CommitLedger ──

/// Ordered commit collection with local/remote presence flags.
///
/// The commit list is held behind an `Arc` and replaced wholesale on every
/// mutation, so a clone taken by a reader never observes a later change.
#[derive(Debug, Clone)]
pub struct CommitLedger {
    commits: Arc<Vec<Commit>>,
    next_id: u64,
}

impl Default for CommitLedger {
    fn default() -> Self {
        Self::seeded()
    }
}

impl CommitLedger {
    /// Ledger holding the fully-synced baseline commits.
    pub fn seeded() -> Self {
        let commits = seed_commits();
        let next_id = commits.len() as u64 + 1;
        Self {
            commits: Arc::new(commits),
            next_id,
        }
    }

    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    /// Shared handle to the current commit list. Identity changes on every
    /// replacement and is stable otherwise.
    pub fn shared(&self) -> Arc<Vec<Commit>> {
        Arc::clone(&self.commits)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn counts(&self) -> SyncCounts {
        let mut counts = SyncCounts {
            total: self.commits.len(),
            ..Default::default()
        };
        for c in self.commits.iter() {
            match c.presence() {
                Some(Presence::LocalOnly) => counts.ahead += 1,
                Some(Presence::RemoteOnly) => counts.behind += 1,
                Some(Presence::Both) => counts.synced += 1,
                None => {}
            }
        }
        counts
    }

    /// Counts, failing if they do not partition the ledger.
    pub fn verify(&self) -> Result<SyncCounts> {
        let counts = self.counts();
        if !counts.is_consistent() {
            return Err(EngineError::invariant(format!(
                "ahead {} + behind {} + synced {} != total {}",
                counts.ahead, counts.behind, counts.synced, counts.total
            )));
        }
        Ok(counts)
    }

    pub fn get(&self, id: CommitId) -> Result<&Commit> {
        self.commits
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| EngineError::invariant(format!("unknown commit id {id}")))
    }

    /// Record a commit made in the local working copy.
    pub fn append_local(&mut self, message: &str, files: Vec<String>, timestamp: &str) -> Commit {
        self.append(message, LOCAL_AUTHOR, files, timestamp, true, false)
    }

    /// Record a commit that appeared on the remote.
    pub fn append_remote(&mut self, message: &str, files: Vec<String>, timestamp: &str) -> Commit {
        self.append(message, REMOTE_AUTHOR, files, timestamp, false, true)
    }

    fn append(
        &mut self,
        message: &str,
        author: &str,
        files: Vec<String>,
        timestamp: &str,
        local: bool,
        remote: bool,
    ) -> Commit {
        let commit = Commit {
            id: CommitId(self.next_id),
            message: message.to_string(),
            author: author.to_string(),
            timestamp: timestamp.to_string(),
            local,
            remote,
            changed_files: files,
        };
        self.next_id += 1;

        let mut next = Vec::with_capacity(self.commits.len() + 1);
        next.extend(self.commits.iter().cloned());
        next.push(commit.clone());
        self.commits = Arc::new(next);
        commit
    }

    /// Mark every local-only commit as present on the remote.
    pub fn push(&mut self) -> LedgerOutcome {
        self.replace_where(Commit::is_ahead, |c| c.remote = true)
    }

    /// Mark every remote-only commit as present locally.
    pub fn pull(&mut self) -> LedgerOutcome {
        self.replace_where(Commit::is_behind, |c| c.local = true)
    }

    fn replace_where(
        &mut self,
        select: impl Fn(&Commit) -> bool,
        apply: impl Fn(&mut Commit),
    ) -> LedgerOutcome {
        let count = self.commits.iter().filter(|&c| select(c)).count();
        if count == 0 {
            return LedgerOutcome::NoOp;
        }
        let next = self
            .commits
            .iter()
            .map(|c| {
                let mut c = c.clone();
                if select(&c) {
                    apply(&mut c);
                }
                c
            })
            .collect();
        self.commits = Arc::new(next);
        LedgerOutcome::Applied { count }
    }

    /// Restore the seeded baseline and restart the id sequence.
    pub fn reset(&mut self) {
        *self = Self::seeded();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn seed_is_fully_synced() {
        let ledger = CommitLedger::seeded();
        let counts = ledger.verify().unwrap();
        assert_eq!(
            counts,
            SyncCounts {
                ahead: 0,
                behind: 0,
                synced: 5,
                total: 5
            }
        );
        let ids: Vec<u64> = ledger.commits().iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn append_local_increments_ahead() {
        let mut ledger = CommitLedger::seeded();
        let before = ledger.counts();
        let c = ledger.append_local("wip", files(&["src/lib.rs"]), BASELINE_TS);
        let after = ledger.counts();

        assert!(c.local && !c.remote);
        assert_eq!(c.author, LOCAL_AUTHOR);
        assert_eq!(after.ahead, before.ahead + 1);
        assert_eq!(after.total, before.total + 1);
        assert_eq!(after.behind, before.behind);
    }

    #[test]
    fn append_remote_increments_behind() {
        let mut ledger = CommitLedger::seeded();
        let before = ledger.counts();
        let c = ledger.append_remote("teammate fix", files(&["README.md"]), BASELINE_TS);
        let after = ledger.counts();

        assert!(!c.local && c.remote);
        assert_eq!(after.behind, before.behind + 1);
        assert_eq!(after.total, before.total + 1);
    }

    #[test]
    fn ids_are_monotonic() {
        let mut ledger = CommitLedger::seeded();
        let a = ledger.append_local("a", vec![], BASELINE_TS);
        let b = ledger.append_remote("b", vec![], BASELINE_TS);
        let c = ledger.append_local("c", vec![], BASELINE_TS);
        assert!(a.id < b.id && b.id < c.id);
        assert_eq!(a.id, CommitId(6));
    }

    #[test]
    fn push_marks_ahead_as_remote_preserving_order() {
        let mut ledger = CommitLedger::seeded();
        ledger.append_local("one", vec![], BASELINE_TS);
        ledger.append_remote("theirs", vec![], BASELINE_TS);
        ledger.append_local("two", vec![], BASELINE_TS);

        let order_before: Vec<CommitId> = ledger.commits().iter().map(|c| c.id).collect();
        assert_eq!(ledger.push(), LedgerOutcome::Applied { count: 2 });
        let order_after: Vec<CommitId> = ledger.commits().iter().map(|c| c.id).collect();

        assert_eq!(order_before, order_after);
        let counts = ledger.counts();
        assert_eq!(counts.ahead, 0);
        assert_eq!(counts.behind, 1);
        assert_eq!(counts.synced, 7);
    }

    #[test]
    fn push_and_pull_without_work_are_noops() {
        let mut ledger = CommitLedger::seeded();
        let before = ledger.shared();
        assert_eq!(ledger.push(), LedgerOutcome::NoOp);
        assert_eq!(ledger.pull(), LedgerOutcome::NoOp);
        assert!(Arc::ptr_eq(&before, &ledger.shared()));
    }

    #[test]
    fn mutation_does_not_touch_earlier_snapshot() {
        let mut ledger = CommitLedger::seeded();
        ledger.append_local("x", vec![], BASELINE_TS);
        let snapshot = ledger.shared();
        ledger.push();
        assert!(snapshot.last().unwrap().is_ahead());
        assert!(ledger.commits().last().unwrap().is_synced());
    }

    #[test]
    fn pull_marks_behind_as_local() {
        let mut ledger = CommitLedger::seeded();
        ledger.append_remote("r1", vec![], BASELINE_TS);
        ledger.append_remote("r2", vec![], BASELINE_TS);
        assert_eq!(ledger.pull(), LedgerOutcome::Applied { count: 2 });
        assert_eq!(ledger.counts().behind, 0);
        assert_eq!(ledger.counts().synced, 7);
    }

    #[test]
    fn reset_restores_seed_and_id_sequence() {
        let mut ledger = CommitLedger::seeded();
        ledger.append_local("x", vec![], BASELINE_TS);
        ledger.append_remote("y", vec![], BASELINE_TS);
        ledger.reset();
        assert_eq!(ledger.commits(), CommitLedger::seeded().commits());
        let c = ledger.append_local("z", vec![], BASELINE_TS);
        assert_eq!(c.id, CommitId(6));
    }

    #[test]
    fn unknown_id_is_invariant_violation() {
        let ledger = CommitLedger::seeded();
        assert!(ledger.get(CommitId(3)).is_ok());
        let err = ledger.get(CommitId(99)).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation { .. }));
    }

    #[test]
    fn independent_ledgers_have_independent_counters() {
        let mut a = CommitLedger::seeded();
        let mut b = CommitLedger::seeded();
        a.append_local("a1", vec![], BASELINE_TS);
        a.append_local("a2", vec![], BASELINE_TS);
        let c = b.append_local("b1", vec![], BASELINE_TS);
        assert_eq!(c.id, CommitId(6));
    }

    #[test]
    fn counts_always_partition_total() {
        let mut ledger = CommitLedger::seeded();
        for i in 0..12 {
            match i % 4 {
                0 => {
                    ledger.append_local("l", vec![], BASELINE_TS);
                }
                1 => {
                    ledger.append_remote("r", vec![], BASELINE_TS);
                }
                2 => {
                    ledger.push();
                }
                _ => {
                    ledger.pull();
                }
            }
            assert!(ledger.verify().is_ok(), "step {i}: {:?}", ledger.counts());
        }
    }
}
