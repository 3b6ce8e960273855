use crate::runner::event::FullEvent;
use std::sync::Mutex;

/// Receives state-change notifications. Called after the state lock is
/// released, in sequence order.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &FullEvent);
}

/// Emits each event as a `tracing` debug record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: &FullEvent) {
        tracing::debug!(
            seq = event.seq,
            kind = event.event.type_name(),
            event = ?event.event,
            "simulator event"
        );
    }
}

/// Collects events in memory (for testing).
#[derive(Debug, Default)]
pub struct CollectNotifier {
    events: Mutex<Vec<FullEvent>>,
}

impl CollectNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FullEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|e| e.event.type_name())
            .collect()
    }
}

impl Notifier for CollectNotifier {
    fn notify(&self, event: &FullEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}
