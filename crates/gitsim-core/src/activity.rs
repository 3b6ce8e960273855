//! Bounded, append-only activity log shown to the learner.

use crate::types::BASELINE_TS;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

const SEED: &[(LogLevel, &str)] = &[
    (LogLevel::Info, "Simulator ready: local and remote share 5 commits"),
    (LogLevel::Success, "GitOps agent watching main at baseline version"),
];

/// Ring buffer of the most recent entries. Oldest entries are evicted first.
///
/// Storage is shared copy-on-write: readers holding a [`ActivityLog::shared`]
/// handle keep their view while the log moves on.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: Arc<VecDeque<LogEntry>>,
    capacity: usize,
}

impl ActivityLog {
    /// Seeded log. `capacity` below the seed size is raised to fit it.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(SEED.len());
        let mut log = Self {
            entries: Arc::new(VecDeque::with_capacity(capacity)),
            capacity,
        };
        log.reset();
        log
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, level: LogLevel, message: impl Into<String>, timestamp: &str) {
        let entries = Arc::make_mut(&mut self.entries);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(LogEntry {
            timestamp: timestamp.to_string(),
            level,
            message: message.into(),
        });
    }

    /// Entries oldest first (retention order).
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Entries newest first (display order).
    pub fn newest_first(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().rev()
    }

    pub fn shared(&self) -> Arc<VecDeque<LogEntry>> {
        Arc::clone(&self.entries)
    }

    /// Restore the two seed entries.
    pub fn reset(&mut self) {
        let entries = SEED
            .iter()
            .map(|(level, message)| LogEntry {
                timestamp: BASELINE_TS.to_string(),
                level: *level,
                message: (*message).to_string(),
            })
            .collect();
        self.entries = Arc::new(entries);
    }
}
