//! Command line parsing.
//!
//! Splits a raw command string into an executable and its arguments using
//! POSIX shell word rules: single and double quotes keep whitespace, a
//! backslash escapes the next character.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A parsed command line. Immutable once built by [`parse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    raw: String,
    executable: String,
    arguments: Vec<String>,
}

impl Command {
    /// The trimmed command line as it was submitted.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Executable and arguments re-joined with single spaces.
    ///
    /// Quoting is not restored, so `echo "a b"` becomes `echo a b`.
    pub fn full_command(&self) -> String {
        if self.arguments.is_empty() {
            return self.executable.clone();
        }
        format!("{} {}", self.executable, self.arguments.join(" "))
    }
}

/// Parse a raw command line.
///
/// # Errors
/// - [`ParseError::Empty`] for empty or whitespace-only input
/// - [`ParseError::Malformed`] for unbalanced quotes, or when the first word
///   is empty after unquoting (`"" ls`)
///
/// # Examples
/// ```
/// use rusty_gate::security::parse;
///
/// let cmd = parse("echo \"a b\" c").unwrap();
/// assert_eq!(cmd.executable(), "echo");
/// assert_eq!(cmd.arguments(), ["a b", "c"]);
/// ```
pub fn parse(raw: &str) -> Result<Command, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut words = shell_words::split(trimmed)
        .map_err(|e| ParseError::Malformed {
            raw: trimmed.to_string(),
            message: e.to_string(),
        })?
        .into_iter();

    // `"" ls` splits into an empty first word: there is text but no program
    let executable = match words.next() {
        Some(word) if !word.is_empty() => word,
        _ => {
            return Err(ParseError::Malformed {
                raw: trimmed.to_string(),
                message: "empty executable".to_string(),
            });
        }
    };

    Ok(Command {
        raw: trimmed.to_string(),
        executable,
        arguments: words.collect(),
    })
}
