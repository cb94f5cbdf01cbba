//! Diagnostic logging setup.
//!
//! Diagnostics go to a per-run file under `logs/` so they never interleave
//! with the interactive prompt. This is separate from the audit log, which
//! has its own durable format.
//!
//! The level is controlled by `RUST_LOG` (default `info`).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directory used when none is given: `logs/` beside the executable.
pub fn default_log_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Install the global subscriber writing to
/// `<dir>/rusty-gate.<timestamp>.log`.
///
/// Returns the appender guard; keep it alive for the life of the process so
/// buffered lines are flushed on exit. Returns `None` (and logs nothing) if
/// the file cannot be created.
pub fn init_logging(dir: Option<&Path>) -> Option<WorkerGuard> {
    let log_dir = dir.map(Path::to_path_buf).unwrap_or_else(default_log_dir);

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
        return None;
    }

    // rusty-gate.2024-12-06-14-30-25.log
    let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    let log_path = log_dir.join(format!("rusty-gate.{}.log", timestamp));

    let log_file = match fs::File::create(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: Failed to create log file: {}", e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // A second init (tests, embedding) keeps the first subscriber.
    if tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        return None;
    }

    tracing::info!("Logging initialized - writing to {}", log_path.display());
    Some(guard)
}
