//! Statistics aggregator with a bounded sample ring
//!
//! Owns the live counters and the fixed-capacity rolling history used for
//! the sparkline. Counters are increment-only atomics so the record path is
//! lock-free; the sample ring has exactly one writer (`tick`) and is read by
//! copying, so `snapshot` never blocks a concurrent `record`.

use crate::events::{Classification, Sample, Severity, Timestamp};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

/// Default number of samples kept for the sparkline window
pub const DEFAULT_SAMPLE_CAPACITY: usize = 100;

/// Totals per severity class at a point in time
///
/// Values are read individually with relaxed ordering; slight skew across
/// counters is acceptable because no invariant spans two of them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub lines: u64,
    pub info: u64,
    pub warning: u64,
    pub error: u64,
    pub panic: u64,
}

impl Totals {
    /// Lines in the error tier (error + panic)
    pub fn errors(&self) -> u64 {
        self.error.saturating_add(self.panic)
    }
}

/// Read-only view of the aggregator state
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub started_at: Timestamp,
    pub totals: Totals,
    /// Per-rule match counts in configuration order
    pub rule_counts: Vec<(String, u64)>,
    /// Sparkline samples, oldest first
    pub samples: Vec<Sample>,
}

/// State carried between ticks, touched only by the tick writer
#[derive(Debug, Default)]
struct TickState {
    prev_total: u64,
    prev_errors: u64,
}

/// Aggregator for classified events
pub struct StatsAggregator {
    started_at: Timestamp,
    total_lines: AtomicU64,
    info: AtomicU64,
    warning: AtomicU64,
    error: AtomicU64,
    panic: AtomicU64,
    /// Match counters parallel to `rule_names`
    rule_counts: Vec<AtomicU64>,
    rule_names: Vec<String>,
    /// Sample ring; written only by `tick`, read by copy in `snapshot`
    samples: RwLock<VecDeque<Sample>>,
    sample_capacity: usize,
    tick_state: Mutex<TickState>,
}

/// Saturating increment; counters must never wrap back to a smaller value,
/// otherwise tick deltas would underflow.
fn saturating_inc(counter: &AtomicU64) {
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
        Some(v.saturating_add(1))
    });
}

impl StatsAggregator {
    /// Create an aggregator tracking the given rules, with a sample ring of
    /// the given capacity
    pub fn new(rule_names: Vec<String>, sample_capacity: usize, started_at: Timestamp) -> Self {
        let rule_counts = rule_names.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            started_at,
            total_lines: AtomicU64::new(0),
            info: AtomicU64::new(0),
            warning: AtomicU64::new(0),
            error: AtomicU64::new(0),
            panic: AtomicU64::new(0),
            rule_counts,
            rule_names,
            samples: RwLock::new(VecDeque::with_capacity(sample_capacity)),
            sample_capacity,
            tick_state: Mutex::new(TickState::default()),
        }
    }

    /// Record one classified event
    ///
    /// Safe to call concurrently from any task; touches atomics only.
    pub fn record(&self, classification: &Classification) {
        saturating_inc(&self.total_lines);
        let counter = match classification.severity {
            Severity::Info => &self.info,
            Severity::Warning => &self.warning,
            Severity::Error => &self.error,
            Severity::Panic => &self.panic,
        };
        saturating_inc(counter);

        if let Some(rule_name) = &classification.matched_rule {
            if let Some(idx) = self.rule_names.iter().position(|n| n == rule_name) {
                saturating_inc(&self.rule_counts[idx]);
            }
        }
    }

    /// Take one sampling tick
    ///
    /// Computes the delta of the total and error counters since the previous
    /// tick and appends it to the sample ring, evicting the oldest entry when
    /// the ring is full. Deltas are well-defined because the counters are
    /// monotonically non-decreasing. Single-writer: only the aggregation task
    /// calls this.
    pub fn tick(&self, now: Timestamp) {
        let totals = self.totals();
        let errors = totals.errors();

        let (total_delta, error_delta) = {
            let mut state = self.tick_state.lock().unwrap();
            let deltas = (
                totals.lines.saturating_sub(state.prev_total),
                errors.saturating_sub(state.prev_errors),
            );
            state.prev_total = totals.lines;
            state.prev_errors = errors;
            deltas
        };

        let mut samples = self.samples.write().unwrap();
        samples.push_back(Sample {
            timestamp: now,
            error_delta,
            total_delta,
        });
        while samples.len() > self.sample_capacity {
            samples.pop_front();
        }
    }

    /// Current totals per severity
    pub fn totals(&self) -> Totals {
        Totals {
            lines: self.total_lines.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            warning: self.warning.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
            panic: self.panic.load(Ordering::Relaxed),
        }
    }

    /// Match count for a rule by name
    pub fn rule_count(&self, name: &str) -> Option<u64> {
        self.rule_names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.rule_counts[idx].load(Ordering::Relaxed))
    }

    /// Read-only snapshot of totals and the sample ring
    pub fn snapshot(&self) -> StatsSnapshot {
        let rule_counts = self
            .rule_names
            .iter()
            .zip(&self.rule_counts)
            .map(|(name, count)| (name.clone(), count.load(Ordering::Relaxed)))
            .collect();

        let samples = self.samples.read().unwrap().iter().copied().collect();

        StatsSnapshot {
            started_at: self.started_at,
            totals: self.totals(),
            rule_counts,
            samples,
        }
    }
}
