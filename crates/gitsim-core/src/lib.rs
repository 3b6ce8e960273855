pub mod activity;
pub mod clock;
pub mod cluster;
pub mod config;
pub mod error;
pub mod file_status;
pub mod history;
pub mod ledger;
pub mod types;

pub use activity::{ActivityLog, LogEntry, LogLevel};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cluster::{
    next_major_version, AgentStatus, ClusterState, ClusterStatus, GitOpsAgentState, Pod, PodStatus,
};
pub use config::SimConfig;
pub use error::{EngineError, RejectReason};
pub use file_status::{derive_file_statuses, FileChangeTracker, FileStatus, FileStatusMap};
pub use history::{DeploymentHistory, DeploymentRecord, DeploymentStatus};
pub use ledger::{Commit, CommitLedger, LedgerOutcome, SyncCounts};
pub use types::*;
