//! Command execution module.
//!
//! This module builds the environment a command sees, spawns it through
//! the shell under a deadline, and reports a structured result.

mod process_group;
mod result;
mod runner;
mod sandbox;

pub use process_group::kill_process_group;
pub use result::{ExecutionResult, NO_EXIT_CODE};
pub use runner::{Executor, ShellExecutor, DEFAULT_SHELL};
pub use sandbox::{
    SandboxEnvironment, FALLBACK_HOME, FALLBACK_LANG, FALLBACK_TERM, FALLBACK_USER, SANDBOX_PATH,
    SANDBOX_SHELL, SANDBOX_VARS,
};
