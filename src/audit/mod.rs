//! Audit trail for every command the engine sees.
//!
//! [`AuditLog`] owns both the in-memory history and the durable journal.
//! A single mutex guards the two, so the journal order always matches the
//! history order. The lock is only held while appending, never while a
//! command runs.
//!
//! Insertion order is authoritative. Timestamps are wall-clock time and can
//! step backwards if the system clock is adjusted.

mod history;
mod journal;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Local;
use tracing::{error, info};

pub use history::{History, HistoryEntry};
pub use journal::{format_record, Severity};

use crate::error::{AuditError, ParseError};
use crate::security::{Command, PolicyDecision};
use crate::shell::ExecutionResult;
use journal::Journal;

struct AuditState {
    history: History,
    journal: Journal,
}

/// Serialized writer for the audit trail. Share it as `Arc<AuditLog>`.
pub struct AuditLog {
    state: Mutex<AuditState>,
    path: Option<PathBuf>,
}

impl AuditLog {
    /// Open (or create) the durable log at `path` in append mode.
    ///
    /// Failure here means the audit guarantee cannot be honored; callers
    /// should treat it as fatal.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        let journal = Journal::open(path)?;
        info!("Audit log opened at {}", path.display());
        Ok(Self::with_journal(journal, Some(path.to_path_buf())))
    }

    /// Audit log backed by an arbitrary writer instead of a file.
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self::with_journal(Journal::from_writer(writer), None)
    }

    fn with_journal(journal: Journal, path: Option<PathBuf>) -> Self {
        Self {
            state: Mutex::new(AuditState {
                history: History::new(),
                journal,
            }),
            path,
        }
    }

    /// Path of the durable log, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one attempt to history and the journal.
    ///
    /// The entry is stamped inside the lock. It is kept in memory even when
    /// the journal write fails; the error is returned so the caller can
    /// report it.
    pub fn record(
        &self,
        command: Command,
        decision: PolicyDecision,
        result: Option<ExecutionResult>,
    ) -> Result<HistoryEntry, AuditError> {
        let mut state = self.lock();
        let entry = HistoryEntry::new(Local::now(), command, decision, result);
        let (severity, message) = describe(&entry);

        state.history.push(entry.clone());
        state
            .journal
            .append(entry.timestamp(), severity, &message)
            .map_err(|e| {
                error!("Failed to write audit record: {}", e);
                AuditError::Write(e)
            })?;
        Ok(entry)
    }

    /// Journal a command line that could not be parsed. No history entry is
    /// created since there is no command to record.
    pub fn record_parse_failure(&self, raw: &str, err: &ParseError) -> Result<(), AuditError> {
        let mut state = self.lock();
        let message = format!("Parse failure: {} - {}", raw.trim(), err);
        state.journal.append(Local::now(), Severity::Warning, &message)?;
        Ok(())
    }

    /// The most recent `limit` entries, oldest first.
    pub fn query(&self, limit: usize) -> Vec<HistoryEntry> {
        self.lock().history.recent(limit).to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().history.is_empty()
    }

    /// Empty the in-memory history and journal a marker. The durable log
    /// keeps every earlier record.
    pub fn clear(&self) -> Result<(), AuditError> {
        let mut state = self.lock();
        state.history.clear();
        state
            .journal
            .append(Local::now(), Severity::Info, "Command history cleared")?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, AuditState> {
        // A panic mid-append leaves at most one missing journal line.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Severity and journal message for an entry.
fn describe(entry: &HistoryEntry) -> (Severity, String) {
    let raw = entry.command().raw();
    let decision = entry.decision();

    let Some(result) = entry.result() else {
        if decision.is_blocked() {
            return (
                Severity::Warning,
                format!("Blocked command: {} - {}", raw, decision.reason()),
            );
        }
        return (
            Severity::Info,
            format!("Awaiting confirmation: {} - {}", raw, decision.reason()),
        );
    };

    if result.was_cancelled() {
        (
            Severity::Error,
            format!("Cancelled: {} (after {} ms)", raw, result.duration_ms()),
        )
    } else if result.timed_out() {
        (
            Severity::Error,
            format!("Timeout: {} (after {} ms)", raw, result.duration_ms()),
        )
    } else if result.failed_to_spawn() {
        (
            Severity::Error,
            format!("Error executing {}: {}", raw, result.stderr().trim()),
        )
    } else if result.succeeded() {
        (Severity::Info, format!("Executed successfully: {}", raw))
    } else {
        (
            Severity::Warning,
            format!("Command failed: {} (exit code: {})", raw, result.exit_code()),
        )
    }
}

#[cfg(test)]
mod tests;
