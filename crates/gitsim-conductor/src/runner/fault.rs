use crate::pipeline::schema::PipelineKind;
use std::collections::HashMap;
use std::sync::Mutex;

/// Hook consulted after a phase's delay and before its mutation.
/// Returning `Some(reason)` fails the phase and stops the run.
pub trait FaultInjector: Send + Sync {
    fn check(&self, pipeline: PipelineKind, phase_id: &str) -> Option<String>;
}

/// Every phase succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn check(&self, _pipeline: PipelineKind, _phase_id: &str) -> Option<String> {
        None
    }
}

/// Fails named phases. Each scripted fault fires once.
#[derive(Debug, Default)]
pub struct ScriptedFaults {
    faults: Mutex<HashMap<(PipelineKind, String), String>>,
}

impl ScriptedFaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(self, pipeline: PipelineKind, phase_id: &str, reason: &str) -> Self {
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((pipeline, phase_id.to_string()), reason.to_string());
        self
    }

    pub fn remaining(&self) -> usize {
        self.faults.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl FaultInjector for ScriptedFaults {
    fn check(&self, pipeline: PipelineKind, phase_id: &str) -> Option<String> {
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(pipeline, phase_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_faults_never_fires() {
        assert!(NoFaults
            .check(PipelineKind::FeatureDeployment, "apply-and-sync")
            .is_none());
    }

    #[test]
    fn scripted_fault_fires_once_for_matching_phase() {
        let faults =
            ScriptedFaults::new().fail(PipelineKind::Rollback, "apply-rollback", "image pull error");
        assert!(faults
            .check(PipelineKind::FeatureDeployment, "apply-rollback")
            .is_none());
        assert_eq!(
            faults.check(PipelineKind::Rollback, "apply-rollback").as_deref(),
            Some("image pull error")
        );
        assert!(faults.check(PipelineKind::Rollback, "apply-rollback").is_none());
        assert_eq!(faults.remaining(), 0);
    }
}
