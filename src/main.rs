//! Entry point for the rusty-gate shell.
//!
//! Loads configuration, opens the audit log (fatal on failure), then runs
//! either a single command (`--once`) or the interactive shell.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;

use rusty_gate::config::EngineConfig;
use rusty_gate::engine::CommandEngine;
use rusty_gate::repl::Repl;
use rusty_gate::utils;

#[derive(Debug, Parser)]
#[command(name = "rusty-gate", version, about = "Policy-gated shell command execution")]
struct Cli {
    /// JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Audit log path (overrides the config file).
    #[arg(long)]
    log_path: Option<PathBuf>,

    /// Per-command timeout in seconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Run commands with the caller's full environment.
    #[arg(long)]
    no_sandbox: bool,

    /// Run one command, print the outcome as JSON and exit.
    #[arg(long, value_name = "COMMAND")]
    once: Option<String>,

    /// With --once, approve a command that needs confirmation.
    #[arg(long, requires = "once")]
    yes: bool,
}

impl Cli {
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(path) = &self.log_path {
            config.log_path = path.clone();
        }
        if let Some(secs) = self.timeout {
            config.timeout_seconds = secs;
        }
        if self.no_sandbox {
            config.sandbox_enabled = false;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging before anything else
    let _log_guard = utils::logger::init_logging(None);

    let config = cli.engine_config()?;
    let engine = CommandEngine::from_config(&config).context("Cannot start without an audit log")?;
    let engine = Arc::new(engine);

    if let Some(command) = &cli.once {
        return run_once(&engine, command, cli.yes).await;
    }

    let repl = Repl::new(engine);
    let mut stdout = std::io::stdout();
    repl.run(BufReader::new(tokio::io::stdin()), &mut stdout).await?;
    Ok(ExitCode::SUCCESS)
}

async fn run_once(engine: &CommandEngine, command: &str, approve: bool) -> Result<ExitCode> {
    let mut outcome = engine.submit(command).await?;
    if outcome.needs_confirmation() && approve {
        outcome = engine.execute_confirmed(command).await?;
    }

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(if outcome.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
