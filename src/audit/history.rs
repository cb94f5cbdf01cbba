//! In-memory record of classification and execution attempts.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::security::{Command, PolicyDecision};
use crate::shell::ExecutionResult;

/// One engine call: what was asked, what policy said, what happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    timestamp: DateTime<Local>,
    command: Command,
    decision: PolicyDecision,
    /// Absent when the command never reached the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<ExecutionResult>,
}

impl HistoryEntry {
    pub(crate) fn new(
        timestamp: DateTime<Local>,
        command: Command,
        decision: PolicyDecision,
        result: Option<ExecutionResult>,
    ) -> Self {
        Self {
            timestamp,
            command,
            decision,
            result,
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn decision(&self) -> &PolicyDecision {
        &self.decision
    }

    pub fn result(&self) -> Option<&ExecutionResult> {
        self.result.as_ref()
    }

    /// Whether the command ran and exited with code 0.
    pub fn succeeded(&self) -> bool {
        self.result.as_ref().is_some_and(ExecutionResult::succeeded)
    }
}

/// Append-only sequence of history entries.
///
/// Entries are only ever pushed; [`History::clear`] is the sole removal.
#[derive(Clone, Debug, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Get the most recent n entries, oldest first.
    pub fn recent(&self, n: usize) -> &[HistoryEntry] {
        let len = self.entries.len();
        let start = len.saturating_sub(n);
        &self.entries[start..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
