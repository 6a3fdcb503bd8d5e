//! Per-source health tracking
//!
//! Lets a presentation layer distinguish "no errors seen" from "pipeline
//! degraded": each tail source reports its last successful read and whether
//! it has exhausted its reopen attempts.

use crate::events::{SourceId, Timestamp};
use std::sync::Mutex;

/// Health state of one watched source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Watching and reading normally
    Active,
    /// Reopen attempts exhausted; retrying on a slow cadence
    Degraded,
}

impl SourceState {
    pub fn is_degraded(self) -> bool {
        self == SourceState::Degraded
    }
}

/// Health record for one watched source
#[derive(Debug, Clone)]
pub struct SourceHealth {
    pub path: String,
    pub state: SourceState,
    /// Last time bytes were successfully read (or the source was opened)
    pub last_read_at: Option<Timestamp>,
    /// Consecutive failed reopen attempts
    pub reopen_failures: u32,
}

/// Registry of source health records, shared between tail tasks and readers
#[derive(Debug)]
pub struct HealthRegistry {
    sources: Mutex<Vec<SourceHealth>>,
}

impl HealthRegistry {
    pub fn new(paths: &[String]) -> Self {
        let sources = paths
            .iter()
            .map(|path| SourceHealth {
                path: path.clone(),
                state: SourceState::Active,
                last_read_at: None,
                reopen_failures: 0,
            })
            .collect();
        Self {
            sources: Mutex::new(sources),
        }
    }

    /// Record a successful read; clears any degraded state
    pub fn record_read(&self, source_id: SourceId, at: Timestamp) {
        let mut sources = self.sources.lock().unwrap();
        if let Some(source) = sources.get_mut(source_id) {
            source.last_read_at = Some(at);
            source.state = SourceState::Active;
            source.reopen_failures = 0;
        }
    }

    /// Record a failed reopen attempt; marks the source degraded once the
    /// attempt budget is exhausted
    pub fn record_reopen_failure(&self, source_id: SourceId, max_attempts: u32) {
        let mut sources = self.sources.lock().unwrap();
        if let Some(source) = sources.get_mut(source_id) {
            source.reopen_failures = source.reopen_failures.saturating_add(1);
            if source.reopen_failures >= max_attempts {
                source.state = SourceState::Degraded;
            }
        }
    }

    /// Copy of all health records
    pub fn snapshot(&self) -> Vec<SourceHealth> {
        self.sources.lock().unwrap().clone()
    }
}
