//! Core event types for the log-monitoring pipeline
//!
//! This module defines the data structures that flow between the tail
//! sources, the classifier, the aggregator and the alert engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Identifier of a watched line source (index into the configured file list)
pub type SourceId = usize;

/// A single complete line read from a watched file
///
/// Produced by a `TailSource` (or the simulator) and consumed exactly once
/// by the classifier. Lines are complete: the trailing newline has been
/// stripped and partial writes are never emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLine {
    /// Which watched source produced this line
    pub source_id: SourceId,
    /// Per-source sequence number, strictly increasing
    pub seq: u64,
    /// Line content without the trailing newline
    pub text: String,
    /// When the tail source observed the line
    pub observed_at: Timestamp,
}

/// Severity tier assigned to a classified line
///
/// Ordered so that the highest severity among multiple matches wins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Normal line, no action required
    Info,
    /// Warning that may require attention
    Warning,
    /// Error-level line
    Error,
    /// Panic/fatal tier indicating a serious failure
    Panic,
}

impl Severity {
    /// Whether this severity counts toward the error-rate statistics
    pub fn is_error(self) -> bool {
        self >= Severity::Error
    }
}

/// Fields extracted when a line decoded as a structured (JSON) record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructuredFields {
    /// Raw value of the level/severity field
    pub level: String,
    /// Value of the service field, when present
    pub service: Option<String>,
}

/// Result of classifying one raw line
///
/// Derived purely from the line text; carries no reference to external state.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Severity tier of the line
    pub severity: Severity,
    /// Name of the first configured rule that matched, if any
    pub matched_rule: Option<String>,
    /// Structured fields when the line parsed as a JSON record
    pub fields: Option<StructuredFields>,
    /// When the underlying line was observed
    pub observed_at: Timestamp,
}

/// One entry in the sparkline ring buffer
///
/// Written once per aggregation tick; deltas are relative to the previous
/// tick's counter values.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Sample {
    /// When this tick was taken
    pub timestamp: Timestamp,
    /// Error-severity lines observed since the previous tick
    pub error_delta: u64,
    /// Total lines observed since the previous tick
    pub total_delta: u64,
}

/// Outbound alert constructed by the alert engine
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notification {
    /// Name of the rule that fired
    pub rule_name: String,
    /// Matches counted when the threshold was reached
    pub trigger_count: u64,
    /// Evaluation window in seconds, if the rule has one
    pub window_secs: Option<u64>,
    /// When the rule fired
    pub timestamp: Timestamp,
    /// Human-readable summary (includes the triggering line)
    pub message: String,
}
