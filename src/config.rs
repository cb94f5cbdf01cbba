//! Engine configuration schema.
//!
//! Loaded from a JSON file; every field is optional and falls back to the
//! built-in defaults. Policy overrides replace the corresponding default
//! table wholesale rather than extending it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::security::{
    PolicyTables, DEFAULT_ALLOWED, DEFAULT_BLOCKED, DEFAULT_CONFIRM, DEFAULT_DANGEROUS_PATTERNS,
};

pub const DEFAULT_LOG_PATH: &str = "/tmp/llm_commands.log";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Root config for the command engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Durable audit log location.
    #[serde(alias = "logPath")]
    pub log_path: PathBuf,
    #[serde(alias = "sandboxEnabled")]
    pub sandbox_enabled: bool,
    #[serde(alias = "timeoutSeconds")]
    pub timeout_seconds: u64,
    #[serde(default, alias = "blockedSet", skip_serializing_if = "Option::is_none")]
    pub blocked: Option<Vec<String>>,
    #[serde(default, alias = "confirmSet", skip_serializing_if = "Option::is_none")]
    pub confirm: Option<Vec<String>>,
    #[serde(default, alias = "allowedSet", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    #[serde(default, alias = "dangerousPatterns", skip_serializing_if = "Option::is_none")]
    pub dangerous_patterns: Option<Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            sandbox_enabled: true,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            blocked: None,
            confirm: None,
            allowed: None,
            dangerous_patterns: None,
        }
    }
}

impl EngineConfig {
    /// Read and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("loading engine config from {}", path.display());
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.log_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("log_path must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Policy tables with any configured overrides applied.
    pub fn policy_tables(&self) -> PolicyTables {
        PolicyTables::new(
            table(&self.blocked, DEFAULT_BLOCKED),
            table(&self.confirm, DEFAULT_CONFIRM),
            table(&self.allowed, DEFAULT_ALLOWED),
            table(&self.dangerous_patterns, DEFAULT_DANGEROUS_PATTERNS),
        )
    }
}

fn table(configured: &Option<Vec<String>>, defaults: &[&str]) -> Vec<String> {
    match configured {
        Some(items) => items.clone(),
        None => defaults.iter().map(|s| s.to_string()).collect(),
    }
}
