//! rusty-gate - policy-gated execution of shell commands
//!
//! Command lines (typically proposed by an LLM assistant) pass through:
//! - parsing into an executable and arguments
//! - classification against blocked, confirmation and allowed tables
//! - execution under a reduced environment with a hard timeout
//! - an audit trail kept in memory and in an append-only log
//! - an interactive shell ([`repl`]) on top of all of it
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rusty_gate::audit::AuditLog;
//! use rusty_gate::engine::CommandEngine;
//! use rusty_gate::security::PolicyTables;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let audit = Arc::new(AuditLog::open("/tmp/llm_commands.log")?);
//!     let engine = CommandEngine::new(PolicyTables::default(), audit);
//!
//!     let outcome = engine.submit("ls -la").await?;
//!     if outcome.needs_confirmation() {
//!         // ask the user, then:
//!         engine.execute_confirmed("ls -la").await?;
//!     } else {
//!         print!("{}", outcome.stdout());
//!     }
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod repl;
pub mod security;
pub mod shell;
pub mod utils;

// Re-export commonly used types
pub use audit::{AuditLog, HistoryEntry};
pub use config::EngineConfig;
pub use engine::{CommandEngine, Outcome};
pub use error::{AuditError, ConfigError, ParseError};
pub use security::{parse, Command, PolicyDecision, PolicyOutcome, PolicyTables};
pub use shell::{ExecutionResult, SandboxEnvironment};
