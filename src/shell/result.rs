//! Structured outcome of one execution attempt.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exit code reported when the process never produced one.
pub const NO_EXIT_CODE: i32 = -1;

/// Result of a single execution attempt. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    succeeded: bool,
    stdout: String,
    stderr: String,
    exit_code: i32,
    blocked: bool,
    timed_out: bool,
    /// The caller abandoned the call before the process finished.
    #[serde(default)]
    cancelled: bool,
    duration_ms: u64,
}

impl ExecutionResult {
    /// The process ran to completion.
    pub fn completed(exit_code: i32, stdout: String, stderr: String, elapsed: Duration) -> Self {
        Self {
            succeeded: exit_code == 0,
            stdout,
            stderr,
            exit_code,
            blocked: false,
            timed_out: false,
            cancelled: false,
            duration_ms: millis(elapsed),
        }
    }

    /// The deadline passed and the process group was killed.
    pub fn timeout(stdout: String, stderr: String, elapsed: Duration) -> Self {
        Self {
            succeeded: false,
            stdout,
            stderr,
            exit_code: NO_EXIT_CODE,
            blocked: false,
            timed_out: true,
            cancelled: false,
            duration_ms: millis(elapsed),
        }
    }

    /// The process could not be started or waited on.
    pub fn spawn_failed(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: error.into(),
            exit_code: NO_EXIT_CODE,
            blocked: false,
            timed_out: false,
            cancelled: false,
            duration_ms: millis(elapsed),
        }
    }

    /// Policy refused the command; nothing was spawned.
    pub fn policy_blocked(reason: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: reason.into(),
            exit_code: NO_EXIT_CODE,
            blocked: true,
            timed_out: false,
            cancelled: false,
            duration_ms: 0,
        }
    }

    /// The caller dropped the call mid-execution; the process group was
    /// killed and no output was collected.
    pub fn cancelled(elapsed: Duration) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: "Execution cancelled before completion".to_string(),
            exit_code: NO_EXIT_CODE,
            blocked: false,
            timed_out: false,
            cancelled: true,
            duration_ms: millis(elapsed),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn blocked(&self) -> bool {
        self.blocked
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// True when the process never started or could not be waited on.
    pub fn failed_to_spawn(&self) -> bool {
        !self.succeeded
            && !self.blocked
            && !self.timed_out
            && !self.cancelled
            && self.exit_code == NO_EXIT_CODE
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
