use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Why an orchestrator run request was turned away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// Another pipeline run is still in flight.
    AlreadyRunning,
    /// Rollback requested while the cluster already runs the baseline.
    AtBaselineVersion { version: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::AlreadyRunning => write!(f, "a pipeline run is already in progress"),
            RejectReason::AtBaselineVersion { version } => {
                write!(f, "cluster is already at baseline version {version}")
            }
        }
    }
}

/// Engine error taxonomy.
///
/// `RunRejected` and `ResetWhileRunning` are caller-visible refusals that
/// leave every component untouched. `InvariantViolation` only arises from a
/// defect inside the engine and should abort the action that hit it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("run rejected: {reason}")]
    RunRejected { reason: RejectReason },

    #[error("reset rejected: a pipeline run is in progress")]
    ResetWhileRunning,

    #[error("invariant violation: {detail}")]
    InvariantViolation { detail: String },
}

impl EngineError {
    pub fn invariant(detail: impl Into<String>) -> Self {
        EngineError::InvariantViolation {
            detail: detail.into(),
        }
    }

    /// True for refusals a caller can simply report; false for engine bugs.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, EngineError::InvariantViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_messages() {
        let err = EngineError::RunRejected {
            reason: RejectReason::AlreadyRunning,
        };
        assert_eq!(
            err.to_string(),
            "run rejected: a pipeline run is already in progress"
        );

        let err = EngineError::RunRejected {
            reason: RejectReason::AtBaselineVersion {
                version: "v1.0.0".into(),
            },
        };
        assert!(err.to_string().contains("baseline version v1.0.0"));
        assert!(err.is_rejection());
    }

    #[test]
    fn invariant_is_not_a_rejection() {
        let err = EngineError::invariant("ahead + behind + synced != total");
        assert!(!err.is_rejection());
        assert!(err.to_string().starts_with("invariant violation"));
    }

    #[test]
    fn reject_reason_serializes_tagged() {
        let json = serde_json::to_string(&RejectReason::AtBaselineVersion {
            version: "v1.0.0".into(),
        })
        .unwrap();
        assert!(json.contains(r#""kind":"at_baseline_version""#));
    }
}
