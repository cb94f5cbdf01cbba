//! Durable append-only audit journal.
//!
//! One record per line: `<ISO-8601 timestamp> - <LEVEL> - <message>`.
//! The file is opened in append mode and never truncated or rewritten.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Local, SecondsFormat};

use crate::error::AuditError;

/// Severity written with each journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Writer for journal lines. Every record is flushed before returning.
pub(crate) struct Journal {
    writer: Box<dyn Write + Send>,
}

impl Journal {
    /// Open `path` for appending, creating it and its parent directory.
    pub(crate) fn open(path: &Path) -> Result<Self, AuditError> {
        let open_err = |source| AuditError::Open {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_err)?;

        Ok(Self::from_writer(file))
    }

    pub(crate) fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    pub(crate) fn append(
        &mut self,
        timestamp: DateTime<Local>,
        severity: Severity,
        message: &str,
    ) -> io::Result<()> {
        let line = format_record(timestamp, severity, message);
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()
    }
}

/// Render one journal line, including the trailing newline.
///
/// Line breaks inside the message are escaped so a record never spans lines.
pub fn format_record(timestamp: DateTime<Local>, severity: Severity, message: &str) -> String {
    let message = message.replace('\r', "\\r").replace('\n', "\\n");
    format!(
        "{} - {} - {}\n",
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, false),
        severity,
        message
    )
}
