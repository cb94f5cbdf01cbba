//! Time-bounded command execution.
//!
//! Each command runs as a single `sh -c` invocation so pipes and
//! redirections written by the command author work. The child leads its
//! own process group and its wait races a deadline. On timeout the whole
//! group is killed and reaped, and dropping the execution future early
//! kills the group as well.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::process_group::kill_process_group;
use super::{ExecutionResult, SandboxEnvironment};
use crate::security::Command;

/// Default shell used to interpret command lines.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// How long captured pipes may stay open after the process exits or is
/// killed. Descendants that detached into another group can hold them open.
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(500);

const PIPE_READ_BUFFER: usize = 16384; // 16KB per read

/// Runs an already-approved command.
///
/// Implementations must always return a result: spawn failures and
/// timeouts are values, not errors.
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        command: &Command,
        env: &SandboxEnvironment,
        timeout: Duration,
    ) -> impl Future<Output = ExecutionResult> + Send;
}

/// Executes command lines through a POSIX shell.
#[derive(Clone, Debug)]
pub struct ShellExecutor {
    shell: PathBuf,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::with_shell(DEFAULT_SHELL)
    }

    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    async fn run(
        &self,
        command: &Command,
        env: &SandboxEnvironment,
        timeout: Duration,
    ) -> ExecutionResult {
        let started = Instant::now();

        let mut cmd = tokio::process::Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command.raw())
            .env_clear()
            .envs(env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn '{}': {}", command.raw(), e);
                return ExecutionResult::spawn_failed(
                    format!("Execution error: {}", e),
                    started.elapsed(),
                );
            }
        };

        let pid = child.id();
        debug!(?pid, "spawned '{}'", command.raw());

        // Kills the group if this future is dropped before the command ends.
        let mut group = GroupGuard::new(pid);
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = tokio::time::sleep(timeout) => None,
        };

        let result = match waited {
            Some(Ok(status)) => {
                let (stdout, stderr) = drain_pipes(pid, stdout, stderr).await;
                ExecutionResult::completed(exit_code(status), stdout, stderr, started.elapsed())
            }
            Some(Err(e)) => {
                terminate(pid);
                drain_pipes(pid, stdout, stderr).await;
                ExecutionResult::spawn_failed(format!("Execution error: {}", e), started.elapsed())
            }
            None => {
                warn!("'{}' exceeded {:?}, killing process group", command.raw(), timeout);
                terminate(pid);
                // Reap the child so it does not linger as a zombie.
                if tokio::time::timeout(PIPE_DRAIN_GRACE, child.wait()).await.is_err() {
                    if let Err(e) = child.start_kill() {
                        debug!("start_kill after timeout failed: {}", e);
                    }
                }
                let (stdout, mut stderr) = drain_pipes(pid, stdout, stderr).await;
                if !stderr.is_empty() && !stderr.ends_with('\n') {
                    stderr.push('\n');
                }
                stderr.push_str(&format!("Command timed out after {:?}", timeout));
                ExecutionResult::timeout(stdout, stderr, started.elapsed())
            }
        };

        group.disarm();
        result
    }
}

impl Executor for ShellExecutor {
    fn execute(
        &self,
        command: &Command,
        env: &SandboxEnvironment,
        timeout: Duration,
    ) -> impl Future<Output = ExecutionResult> + Send {
        self.run(command, env, timeout)
    }
}

/// Exit code, or 128 + signal number for a signal-terminated child (the
/// shell convention), so [`super::NO_EXIT_CODE`] stays reserved for
/// processes that never ran to completion.
fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(super::NO_EXIT_CODE)
}

fn terminate(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };
    if let Err(e) = kill_process_group(pid) {
        error!("Failed to kill process group {}: {}", pid, e);
    }
}

/// Kills a process group on drop unless disarmed.
struct GroupGuard {
    pid: Option<u32>,
}

impl GroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if self.pid.is_some() {
            warn!(pid = ?self.pid, "execution abandoned, killing process group");
            terminate(self.pid);
        }
    }
}

fn spawn_reader<R>(pipe: Option<R>) -> PipeReader
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buf = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buf);

    let task = tokio::spawn(async move {
        let Some(mut pipe) = pipe else {
            return;
        };
        let mut chunk = [0u8; PIPE_READ_BUFFER];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    let mut buf = sink.lock().unwrap_or_else(PoisonError::into_inner);
                    buf.extend_from_slice(&chunk[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("pipe read ended with error: {}", e);
                    break;
                }
            }
        }
    });

    PipeReader {
        buf,
        task,
        closed: false,
    }
}

/// Output captured from one pipe by a background reader task.
///
/// The buffer is shared so output read before an abort is kept.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
    closed: bool,
}

impl PipeReader {
    /// Wait for EOF until `deadline`. Returns whether the pipe is closed.
    async fn wait_until(&mut self, deadline: tokio::time::Instant) -> bool {
        if !self.closed {
            self.closed = tokio::time::timeout_at(deadline, &mut self.task)
                .await
                .is_ok();
        }
        self.closed
    }

    fn into_string(self) -> String {
        let bytes = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        if !self.closed {
            self.task.abort();
        }
    }
}

/// Collect both pipes, waiting at most [`PIPE_DRAIN_GRACE`].
///
/// A pipe still open after the grace period is held by a leftover
/// descendant (typically a background job): the group is killed and the
/// readers get one more grace period before being abandoned.
async fn drain_pipes(
    pid: Option<u32>,
    mut stdout: PipeReader,
    mut stderr: PipeReader,
) -> (String, String) {
    let deadline = tokio::time::Instant::now() + PIPE_DRAIN_GRACE;
    let stdout_closed = stdout.wait_until(deadline).await;
    let stderr_closed = stderr.wait_until(deadline).await;

    if !(stdout_closed && stderr_closed) {
        debug!(?pid, "pipes still open after exit, killing leftover descendants");
        terminate(pid);
        let deadline = tokio::time::Instant::now() + PIPE_DRAIN_GRACE;
        stdout.wait_until(deadline).await;
        stderr.wait_until(deadline).await;
    }

    (stdout.into_string(), stderr.into_string())
}
