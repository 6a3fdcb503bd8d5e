//! Configuration loading and validation
//!
//! The pipeline is configured from a TOML file (default `config.toml` in the
//! working directory). Configuration is loaded once at startup and immutable
//! for the process lifetime; a missing or invalid file is a fatal error
//! because there is no sensible default rule set to substitute.

use crate::error::ConfigError;
use crate::events::Severity;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default cooldown applied when a rule does not specify one
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;

/// One operator-defined alerting rule
#[derive(Debug, Deserialize, Clone)]
pub struct Rule {
    /// Unique rule name, referenced by notifications and per-rule counters
    pub name: String,
    /// Regex pattern, compiled into the combined matcher at startup
    pub pattern: String,
    /// Number of matches that triggers a notification
    pub threshold: u64,
    /// Severity assigned to lines matching this rule
    #[serde(default = "default_rule_severity")]
    pub severity: Severity,
    /// Minimum seconds between two notifications for this rule
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Optional evaluation window; matches older than this are not counted
    pub window_secs: Option<u64>,
}

fn default_rule_severity() -> Severity {
    Severity::Error
}

fn default_cooldown_secs() -> u64 {
    DEFAULT_COOLDOWN_SECS
}

/// Top-level application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Cadence for aggregation ticks and UI refresh, in milliseconds
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// Webhook delivery target; absence disables alerting
    pub webhook_url: Option<String>,
    /// Files to tail
    #[serde(default = "default_log_files")]
    pub log_files: Vec<String>,
    /// Ordered alerting rules (order matters for tie-breaking)
    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn default_polling_interval_ms() -> u64 {
    100
}

fn default_log_files() -> Vec<String> {
    vec!["test.log".to_string()]
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// Rule patterns are compiled here so that a bad pattern is reported as
    /// a configuration error at startup rather than a classifier failure at
    /// runtime.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "polling_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.log_files.is_empty() {
            return Err(ConfigError::ValidationError(
                "log_files must name at least one file to watch".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if rule.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "rule names must not be empty".to_string(),
                ));
            }
            if !seen.insert(rule.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate rule name '{}'",
                    rule.name
                )));
            }
            if rule.threshold == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "rule '{}' threshold must be greater than zero",
                    rule.name
                )));
            }
            regex::Regex::new(&rule.pattern).map_err(|e| ConfigError::InvalidPattern {
                rule: rule.name.clone(),
                source: e,
            })?;
        }

        Ok(())
    }

    /// Aggregation tick interval as a Duration
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }
}
