//! Live counters and rolling sample history

mod stats_aggregator;

pub use stats_aggregator::{StatsAggregator, StatsSnapshot, Totals, DEFAULT_SAMPLE_CAPACITY};
