//! Security module for command parsing and policy classification.
//!
//! This module splits raw command lines, checks them against the blocked,
//! confirmation and allowed sets, and scans them for dangerous patterns.

mod gate;
mod parser;
mod policy;

use serde::{Deserialize, Serialize};

pub use gate::{gate_command, GateAction};
pub use parser::{parse, Command};
pub use policy::{
    PolicyTables, DEFAULT_ALLOWED, DEFAULT_BLOCKED, DEFAULT_CONFIRM, DEFAULT_DANGEROUS_PATTERNS,
};

/// Verdict tier for a classified command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyOutcome {
    /// Never executed.
    Blocked,
    /// Executed without asking.
    Allowed,
    /// Executed only through the confirmed entry point.
    AllowedPendingConfirmation,
}

/// Result of classifying a command: the tier plus a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    outcome: PolicyOutcome,
    reason: String,
}

impl PolicyDecision {
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            outcome: PolicyOutcome::Blocked,
            reason: reason.into(),
        }
    }

    pub fn allowed(reason: impl Into<String>) -> Self {
        Self {
            outcome: PolicyOutcome::Allowed,
            reason: reason.into(),
        }
    }

    pub fn pending(reason: impl Into<String>) -> Self {
        Self {
            outcome: PolicyOutcome::AllowedPendingConfirmation,
            reason: reason.into(),
        }
    }

    pub fn outcome(&self) -> PolicyOutcome {
        self.outcome
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn is_blocked(&self) -> bool {
        self.outcome == PolicyOutcome::Blocked
    }

    pub fn requires_confirmation(&self) -> bool {
        self.outcome == PolicyOutcome::AllowedPendingConfirmation
    }
}
