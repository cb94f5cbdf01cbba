//! Line-oriented interactive shell over [`CommandEngine`].
//!
//! Meta commands (`help`, `history`, `status`...) are handled here; any
//! other line is submitted to the engine. Commands that need confirmation
//! prompt on the same input stream.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use crossterm::style::Stylize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, error};

use crate::audit::HistoryEntry;
use crate::engine::{CommandEngine, Outcome};
use crate::shell::{Executor, ShellExecutor};

const PROMPT: &str = "rusty-gate> ";
const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Built-in commands handled by the shell itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Exit,
    Help,
    History(usize),
    Clear,
    Status,
}

impl MetaCommand {
    /// Recognize a meta command. Matching is case-insensitive on the first
    /// word; `history` takes an optional entry count.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let head = words.next()?.to_lowercase();
        let rest: Vec<&str> = words.collect();

        match (head.as_str(), rest.as_slice()) {
            ("exit" | "quit", []) => Some(Self::Exit),
            ("help", []) => Some(Self::Help),
            ("clear", []) => Some(Self::Clear),
            ("status", []) => Some(Self::Status),
            ("history", []) => Some(Self::History(DEFAULT_HISTORY_LIMIT)),
            ("history", [n]) => n.parse().ok().map(Self::History),
            _ => None,
        }
    }
}

/// Reply to the `Execute this command?` prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    Skip,
}

impl Confirmation {
    /// Anything that is not an explicit yes or skip counts as no.
    pub fn parse(reply: &str) -> Self {
        match reply.trim().to_lowercase().as_str() {
            "y" | "yes" => Self::Yes,
            "s" | "skip" => Self::Skip,
            _ => Self::No,
        }
    }
}

pub struct Repl<E = ShellExecutor> {
    engine: Arc<CommandEngine<E>>,
}

impl<E: Executor> Repl<E> {
    pub fn new(engine: Arc<CommandEngine<E>>) -> Self {
        Self { engine }
    }

    /// Run until `exit`/`quit` or end of input.
    pub async fn run<R, W>(&self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        print_banner(out)?;

        loop {
            write!(out, "\n{}", PROMPT.bold())?;
            out.flush()?;

            let Some(line) = lines.next_line().await? else {
                writeln!(out, "\nExiting...")?;
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match MetaCommand::parse(line) {
                Some(MetaCommand::Exit) => {
                    writeln!(out, "Goodbye!")?;
                    break;
                }
                Some(MetaCommand::Help) => print_help(out)?,
                Some(MetaCommand::History(limit)) => {
                    print_history(out, &self.engine.history(limit))?
                }
                Some(MetaCommand::Clear) => {
                    if let Err(e) = self.engine.clear_history() {
                        error!("Failed to journal history clear: {}", e);
                    }
                    writeln!(out, "History cleared.")?;
                }
                Some(MetaCommand::Status) => self.print_status(out)?,
                None => self.handle_command(line, &mut lines, out).await?,
            }
        }
        Ok(())
    }

    async fn handle_command<R, W>(
        &self,
        line: &str,
        lines: &mut Lines<R>,
        out: &mut W,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let outcome = match self.engine.submit(line).await {
            Ok(outcome) => outcome,
            Err(e) => {
                writeln!(out, "{} {}", "Error:".red(), e)?;
                return Ok(());
            }
        };

        if !outcome.needs_confirmation() {
            return print_outcome(out, &outcome);
        }

        writeln!(out, "{} {}", "⚠".yellow(), outcome.reason())?;
        writeln!(out, "Command: {}", outcome.command().raw())?;
        write!(out, "Execute this command? (y/n/s) ")?;
        out.flush()?;

        let reply = lines.next_line().await?.unwrap_or_default();
        match Confirmation::parse(&reply) {
            Confirmation::Yes => match self.engine.execute_confirmed(line).await {
                Ok(outcome) => print_outcome(out, &outcome)?,
                Err(e) => writeln!(out, "{} {}", "Error:".red(), e)?,
            },
            Confirmation::Skip => writeln!(out, "Skipped.")?,
            Confirmation::No => writeln!(out, "Command execution cancelled.")?,
        }
        debug!("confirmation handled for '{}'", line);
        Ok(())
    }

    fn print_status<W: Write>(&self, out: &mut W) -> Result<()> {
        let sandbox = if self.engine.sandbox_enabled() {
            format!("{} Security sandbox: Enabled", "✓".green())
        } else {
            format!("{} Security sandbox: Disabled", "⚠".yellow())
        };
        writeln!(out, "{}", sandbox)?;
        writeln!(out, "Timeout: {}s", self.engine.default_timeout().as_secs())?;
        match self.engine.audit().path() {
            Some(path) => writeln!(out, "Audit log: {}", path.display())?,
            None => writeln!(out, "Audit log: in memory")?,
        }
        writeln!(out, "History entries: {}", self.engine.audit().len())?;
        Ok(())
    }
}

fn print_banner<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "{}", "=".repeat(60))?;
    writeln!(out, "    {}", "rusty-gate - policy-gated command shell".bold().cyan())?;
    writeln!(out, "{}", "=".repeat(60))?;
    writeln!(out, "Type 'help' for commands, 'exit' to quit.")?;
    Ok(())
}

fn print_help<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "Commands:")?;
    writeln!(out, "  exit, quit      - Exit the shell")?;
    writeln!(out, "  help            - Show this help message")?;
    writeln!(out, "  history [N]     - Show the last N commands (default {})", DEFAULT_HISTORY_LIMIT)?;
    writeln!(out, "  clear           - Clear command history")?;
    writeln!(out, "  status          - Show engine status")?;
    writeln!(out, "Anything else is checked against policy and executed.")?;
    Ok(())
}

fn print_history<W: Write>(out: &mut W, entries: &[HistoryEntry]) -> Result<()> {
    if entries.is_empty() {
        writeln!(out, "No command history yet.")?;
        return Ok(());
    }
    for (i, entry) in entries.iter().enumerate() {
        let status = if entry.succeeded() {
            "✓".green()
        } else {
            "✗".red()
        };
        writeln!(
            out,
            "{}. {} {} ({})",
            i + 1,
            status,
            entry.command().raw(),
            entry.timestamp().format("%Y-%m-%d %H:%M:%S")
        )?;
    }
    Ok(())
}

/// Render an outcome for a human.
pub fn print_outcome<W: Write>(out: &mut W, outcome: &Outcome) -> Result<()> {
    if outcome.blocked() {
        writeln!(out, "{} {}", "❌ Blocked:".red(), outcome.reason())?;
        return Ok(());
    }
    if outcome.timed_out() {
        writeln!(out, "{} {}", "⏱ Timed out:".red(), outcome.command().raw())?;
        write_block(out, "Error:", outcome.stderr())?;
        return Ok(());
    }
    if outcome.succeeded() {
        writeln!(
            out,
            "{} (exit code: {})",
            "✅ Success".green(),
            outcome.exit_code()
        )?;
        write_block(out, "Output:", outcome.stdout())?;
    } else {
        writeln!(
            out,
            "{} (exit code: {})",
            "❌ Failed".red(),
            outcome.exit_code()
        )?;
        write_block(out, "Output:", outcome.stdout())?;
        write_block(out, "Error:", outcome.stderr())?;
    }
    Ok(())
}

fn write_block<W: Write>(out: &mut W, label: &str, text: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    writeln!(out, "{}", label.dim())?;
    write!(out, "{}", text)?;
    if !text.ends_with('\n') {
        writeln!(out)?;
    }
    Ok(())
}
