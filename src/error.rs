//! Error types shared across the crate.
//!
//! Only conditions that cannot be expressed as an execution outcome live
//! here. Blocked, timed out and failed commands are reported through
//! [`crate::engine::Outcome`] instead.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while splitting a raw command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Input was empty or contained only whitespace.
    #[error("empty command")]
    Empty,
    /// Quoting or escaping was unbalanced.
    #[error("malformed command '{raw}': {message}")]
    Malformed { raw: String, message: String },
}

/// Errors raised by the durable audit log.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The log file (or its parent directory) could not be opened.
    #[error("failed to open audit log {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Appending a record failed.
    #[error("failed to append to audit log: {0}")]
    Write(#[from] std::io::Error),
}

/// Errors returned while loading engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the config file failed.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid JSON for the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A field failed validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}
