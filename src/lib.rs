/// Error types for the log sentinel
pub mod error;

/// Core event and classification types
pub mod events;

/// Log sources: file tailers and the traffic simulator
pub mod collectors;

/// Line classification: structured fast path and keyword patterns
pub mod classifier;

/// Live statistics: counters and the sample ring
pub mod aggregator;

/// Alert rules and webhook notification delivery
pub mod alerts;

/// Per-source health tracking
pub mod health;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use error::{AlertError, ConfigError, TailError};
