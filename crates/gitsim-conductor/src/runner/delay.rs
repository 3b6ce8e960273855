//! Inter-phase suspension points.
//!
//! Every phase waits on a [`Delay`] before its mutation. The wait is raced
//! against the run's cancellation token, so a cancel only ever lands on a
//! phase boundary.

use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayOutcome {
    Elapsed,
    Cancelled,
}

#[async_trait::async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> DelayOutcome;
}

/// Real timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

#[async_trait::async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> DelayOutcome {
        tokio::select! {
            _ = cancel.cancelled() => DelayOutcome::Cancelled,
            _ = tokio::time::sleep(duration) => DelayOutcome::Elapsed,
        }
    }
}

/// Deterministic test clock: records each requested duration and yields
/// once instead of sleeping.
#[derive(Debug, Default)]
pub struct InstantDelay {
    requested: Mutex<Vec<Duration>>,
}

impl InstantDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requested(&self) -> Vec<Duration> {
        self.requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Sum of every requested wait.
    pub fn total(&self) -> Duration {
        self.requested().iter().sum()
    }
}

#[async_trait::async_trait]
impl Delay for InstantDelay {
    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> DelayOutcome {
        self.requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            DelayOutcome::Cancelled
        } else {
            DelayOutcome::Elapsed
        }
    }
}
