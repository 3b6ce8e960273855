use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp shared by every seeded baseline value. Fixed so that a reset
/// reproduces a byte-identical baseline.
pub const BASELINE_TS: &str = "2024-01-15T09:00:00Z";

/// Author recorded on commits created through the local working copy.
pub const LOCAL_AUTHOR: &str = "you";

/// Author recorded on commits that arrive through the simulated remote.
pub const REMOTE_AUTHOR: &str = "teammate";

/// Monotonic commit identifier, unique within one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(pub u64);

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{:04}", self.0)
    }
}

/// Which side(s) of the simulated repository a commit is present on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    LocalOnly,
    RemoteOnly,
    Both,
}

impl Presence {
    pub fn from_flags(local: bool, remote: bool) -> Option<Self> {
        match (local, remote) {
            (true, false) => Some(Presence::LocalOnly),
            (false, true) => Some(Presence::RemoteOnly),
            (true, true) => Some(Presence::Both),
            (false, false) => None,
        }
    }
}
