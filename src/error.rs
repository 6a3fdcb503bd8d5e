use thiserror::Error;

/// Errors that can occur while tailing a log file
#[derive(Error, Debug)]
pub enum TailError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur when delivering alert notifications
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Webhook returned status {0}")]
    WebhookStatus(u16),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid rule pattern for '{rule}': {source}")]
    InvalidPattern { rule: String, source: regex::Error },

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
