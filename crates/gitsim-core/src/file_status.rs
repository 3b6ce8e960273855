use crate::ledger::{Commit, CommitLedger};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Per-file sync classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Changed by both the latest local-only and latest remote-only commit.
    Both,
    Local,
    Remote,
    Clean,
}

pub type FileStatusMap = BTreeMap<String, FileStatus>;

/// Classify every file ever touched in `commits`.
///
/// Only the most recent local-only commit and the most recent remote-only
/// commit contribute change sets; everything else is `Clean`.
pub fn derive_file_statuses(commits: &[Commit]) -> FileStatusMap {
    let last_local = commits.iter().rev().find(|c| c.is_ahead());
    let last_remote = commits.iter().rev().find(|c| c.is_behind());

    let local: BTreeSet<&str> = last_local
        .map(|c| c.changed_files.iter().map(String::as_str).collect())
        .unwrap_or_default();
    let remote: BTreeSet<&str> = last_remote
        .map(|c| c.changed_files.iter().map(String::as_str).collect())
        .unwrap_or_default();

    commits
        .iter()
        .flat_map(|c| c.changed_files.iter())
        .map(|file| {
            let status = match (local.contains(file.as_str()), remote.contains(file.as_str())) {
                (true, true) => FileStatus::Both,
                (true, false) => FileStatus::Local,
                (false, true) => FileStatus::Remote,
                (false, false) => FileStatus::Clean,
            };
            (file.clone(), status)
        })
        .collect()
}

/// Memoizing wrapper around [`derive_file_statuses`].
///
/// Keyed by the identity of the ledger's shared commit list. The cached
/// `Arc` is kept alive, so its address cannot be reused by a newer list.
#[derive(Debug, Default)]
pub struct FileChangeTracker {
    cache: Option<(Arc<Vec<Commit>>, Arc<FileStatusMap>)>,
    computations: u64,
}

impl FileChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&mut self, ledger: &CommitLedger) -> Arc<FileStatusMap> {
        let current = ledger.shared();
        if let Some((key, map)) = &self.cache {
            if Arc::ptr_eq(key, &current) {
                return Arc::clone(map);
            }
        }
        let map = Arc::new(derive_file_statuses(&current));
        self.computations += 1;
        self.cache = Some((current, Arc::clone(&map)));
        map
    }

    /// How many times the derivation actually ran.
    pub fn computations(&self) -> u64 {
        self.computations
    }
}
