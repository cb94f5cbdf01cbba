//! Policy-gated command engine.
//!
//! The only surface collaborators use: a raw command string goes in, a
//! structured [`Outcome`] comes out. Every call whose input parses records
//! exactly one history entry, whether or not the command ran.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::audit::{AuditLog, HistoryEntry};
use crate::config::EngineConfig;
use crate::error::{AuditError, ParseError};
use crate::security::{gate_command, parse, Command, GateAction, PolicyDecision, PolicyTables};
use crate::shell::{ExecutionResult, Executor, SandboxEnvironment, ShellExecutor, NO_EXIT_CODE};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What happened to one submitted command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    command: Command,
    decision: PolicyDecision,
    /// `None` while the command awaits confirmation.
    result: Option<ExecutionResult>,
}

impl Outcome {
    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn decision(&self) -> &PolicyDecision {
        &self.decision
    }

    pub fn result(&self) -> Option<&ExecutionResult> {
        self.result.as_ref()
    }

    pub fn reason(&self) -> &str {
        self.decision.reason()
    }

    pub fn succeeded(&self) -> bool {
        self.result.as_ref().is_some_and(ExecutionResult::succeeded)
    }

    pub fn blocked(&self) -> bool {
        self.decision.is_blocked()
    }

    pub fn timed_out(&self) -> bool {
        self.result.as_ref().is_some_and(ExecutionResult::timed_out)
    }

    /// The command was not run; resubmit through
    /// [`CommandEngine::execute_confirmed`] once the user approves.
    pub fn needs_confirmation(&self) -> bool {
        self.result.is_none()
    }

    pub fn stdout(&self) -> &str {
        self.result.as_ref().map_or("", ExecutionResult::stdout)
    }

    pub fn stderr(&self) -> &str {
        self.result.as_ref().map_or("", ExecutionResult::stderr)
    }

    pub fn exit_code(&self) -> i32 {
        self.result
            .as_ref()
            .map_or(NO_EXIT_CODE, ExecutionResult::exit_code)
    }
}

/// Parses, classifies, executes and audits command lines.
///
/// Cheap to share behind an `Arc`: concurrent calls only meet at the audit
/// log's append lock.
pub struct CommandEngine<E = ShellExecutor> {
    policy: RwLock<Arc<PolicyTables>>,
    audit: Arc<AuditLog>,
    executor: E,
    sandbox_enabled: bool,
    timeout: Duration,
}

impl CommandEngine<ShellExecutor> {
    /// Engine with the shell executor, sandboxing on and the default timeout.
    pub fn new(policy: PolicyTables, audit: Arc<AuditLog>) -> Self {
        Self::with_executor(policy, audit, ShellExecutor::new())
    }

    /// Open the audit log named by `config` and build an engine from it.
    pub fn from_config(config: &EngineConfig) -> Result<Self, AuditError> {
        let audit = Arc::new(AuditLog::open(&config.log_path)?);
        Ok(Self::new(config.policy_tables(), audit)
            .sandbox(config.sandbox_enabled)
            .timeout(config.timeout()))
    }
}

impl<E: Executor> CommandEngine<E> {
    pub fn with_executor(policy: PolicyTables, audit: Arc<AuditLog>, executor: E) -> Self {
        Self {
            policy: RwLock::new(Arc::new(policy)),
            audit,
            executor,
            sandbox_enabled: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn sandbox(mut self, enabled: bool) -> Self {
        self.sandbox_enabled = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn sandbox_enabled(&self) -> bool {
        self.sandbox_enabled
    }

    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Snapshot of the current policy tables.
    pub fn policy(&self) -> Arc<PolicyTables> {
        Arc::clone(&self.policy.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap the policy tables. Calls already past classification keep the
    /// tables they started with.
    pub fn replace_policy(&self, policy: PolicyTables) {
        *self.policy.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(policy);
    }

    /// Submit a command with the default timeout.
    ///
    /// Allowed commands run immediately. Commands needing confirmation are
    /// returned unexecuted (see [`Outcome::needs_confirmation`]).
    ///
    /// # Errors
    /// Only [`ParseError`]; every other outcome is a value in [`Outcome`].
    pub async fn submit(&self, raw: &str) -> Result<Outcome, ParseError> {
        self.process(raw, false, self.timeout).await
    }

    pub async fn submit_with_timeout(
        &self,
        raw: &str,
        timeout: Duration,
    ) -> Result<Outcome, ParseError> {
        self.process(raw, false, timeout).await
    }

    /// Run a command the caller has approved.
    ///
    /// The command is parsed and classified again, so a command blocked by
    /// the current tables stays blocked whatever was approved earlier.
    pub async fn execute_confirmed(&self, raw: &str) -> Result<Outcome, ParseError> {
        self.process(raw, true, self.timeout).await
    }

    pub async fn execute_confirmed_with_timeout(
        &self,
        raw: &str,
        timeout: Duration,
    ) -> Result<Outcome, ParseError> {
        self.process(raw, true, timeout).await
    }

    /// Most recent `limit` history entries, oldest first.
    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.audit.query(limit)
    }

    pub fn clear_history(&self) -> Result<(), AuditError> {
        self.audit.clear()
    }

    async fn process(
        &self,
        raw: &str,
        confirmed: bool,
        timeout: Duration,
    ) -> Result<Outcome, ParseError> {
        let command = match parse(raw) {
            Ok(command) => command,
            Err(e) => {
                warn!("Failed to parse command '{}': {}", raw, e);
                if let Err(audit_err) = self.audit.record_parse_failure(raw, &e) {
                    error!("Parse failure not journaled: {}", audit_err);
                }
                return Err(e);
            }
        };

        let decision = self.policy().classify(&command);

        let result = match gate_command(&decision, confirmed) {
            GateAction::Deny => {
                warn!("Blocked command: {} - {}", command.raw(), decision.reason());
                self.record(&command, &decision, None);
                Some(ExecutionResult::policy_blocked(decision.reason()))
            }
            GateAction::AwaitConfirmation => {
                info!("Awaiting confirmation: {}", command.raw());
                self.record(&command, &decision, None);
                None
            }
            GateAction::Execute => {
                let env = SandboxEnvironment::build(self.sandbox_enabled);
                let in_flight = InFlight::new(&self.audit, &command, &decision);
                let result = self.executor.execute(&command, &env, timeout).await;
                in_flight.finish();
                info!(
                    exit_code = result.exit_code(),
                    timed_out = result.timed_out(),
                    duration_ms = result.duration_ms(),
                    "Executed: {}",
                    command.raw()
                );
                self.record(&command, &decision, Some(result.clone()));
                Some(result)
            }
        };

        Ok(Outcome {
            command,
            decision,
            result,
        })
    }

    fn record(&self, command: &Command, decision: &PolicyDecision, result: Option<ExecutionResult>) {
        // The history entry is kept even if the journal write fails.
        if let Err(e) = self.audit.record(command.clone(), decision.clone(), result) {
            error!("Audit record incomplete for '{}': {}", command.raw(), e);
        }
    }
}

/// Records a cancelled entry if the execution future is dropped before
/// the executor returns.
struct InFlight<'a> {
    audit: &'a AuditLog,
    command: &'a Command,
    decision: &'a PolicyDecision,
    started: Instant,
    done: bool,
}

impl<'a> InFlight<'a> {
    fn new(audit: &'a AuditLog, command: &'a Command, decision: &'a PolicyDecision) -> Self {
        Self {
            audit,
            command,
            decision,
            started: Instant::now(),
            done: false,
        }
    }

    fn finish(mut self) {
        self.done = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        warn!("Execution cancelled: {}", self.command.raw());
        let result = ExecutionResult::cancelled(self.started.elapsed());
        if let Err(e) = self
            .audit
            .record(self.command.clone(), self.decision.clone(), Some(result))
        {
            error!("Audit record incomplete for '{}': {}", self.command.raw(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::PolicyOutcome;
    use pretty_assertions::assert_eq;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Executor that counts calls instead of spawning anything.
    #[derive(Default)]
    struct SpyExecutor {
        calls: AtomicUsize,
    }

    impl Executor for SpyExecutor {
        fn execute(
            &self,
            _command: &Command,
            _env: &SandboxEnvironment,
            _timeout: Duration,
        ) -> impl Future<Output = ExecutionResult> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(ExecutionResult::completed(
                0,
                "spy\n".to_string(),
                String::new(),
                Duration::ZERO,
            ))
        }
    }

    /// Executor whose command never finishes.
    struct StuckExecutor;

    impl Executor for StuckExecutor {
        fn execute(
            &self,
            _command: &Command,
            _env: &SandboxEnvironment,
            _timeout: Duration,
        ) -> impl Future<Output = ExecutionResult> + Send {
            std::future::pending()
        }
    }

    fn spy_engine(policy: PolicyTables) -> CommandEngine<SpyExecutor> {
        let audit = Arc::new(AuditLog::from_writer(std::io::sink()));
        CommandEngine::with_executor(policy, audit, SpyExecutor::default())
    }

    fn calls(engine: &CommandEngine<SpyExecutor>) -> usize {
        engine.executor.calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_blocked_commands_never_reach_executor() {
        let engine = spy_engine(PolicyTables::default());
        for raw in ["rm -rf /", "rm notes.txt", "dd if=/dev/zero of=x", "reboot"] {
            let outcome = engine.submit(raw).await.unwrap();
            assert_eq!(outcome.decision().outcome(), PolicyOutcome::Blocked, "{raw}");
            assert!(outcome.blocked());
            assert!(!outcome.succeeded());
            assert!(outcome.result().unwrap().blocked());

            // confirmation does not unlock a blocked command
            let outcome = engine.execute_confirmed(raw).await.unwrap();
            assert!(outcome.blocked());
        }
        assert_eq!(calls(&engine), 0);
        assert_eq!(engine.history(100).len(), 8);
        assert!(engine.history(100).iter().all(|e| e.result().is_none()));
    }

    #[tokio::test]
    async fn test_dangerous_pattern_blocks_allowed_executable() {
        let engine = spy_engine(PolicyTables::default());
        let outcome = engine.submit("ls; rm -rf ~").await.unwrap();
        assert!(outcome.blocked());
        assert_eq!(outcome.reason(), "Command contains dangerous pattern: ; rm -rf");
        assert_eq!(calls(&engine), 0);
    }

    #[tokio::test]
    async fn test_allowed_command_executes_once() {
        let engine = spy_engine(PolicyTables::default());
        let outcome = engine.submit("ls -la").await.unwrap();
        assert!(outcome.succeeded());
        assert_eq!(outcome.stdout(), "spy\n");
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(calls(&engine), 1);
    }

    #[tokio::test]
    async fn test_pending_command_waits_for_confirmation() {
        let engine = spy_engine(PolicyTables::default());

        let outcome = engine.submit("mkdir testdir").await.unwrap();
        assert!(outcome.needs_confirmation());
        assert!(!outcome.succeeded());
        assert!(!outcome.blocked());
        assert_eq!(outcome.exit_code(), NO_EXIT_CODE);
        assert_eq!(calls(&engine), 0);

        let outcome = engine.execute_confirmed("mkdir testdir").await.unwrap();
        assert!(outcome.succeeded());
        assert_eq!(calls(&engine), 1);
        assert_eq!(engine.history(10).len(), 2);
    }

    #[tokio::test]
    async fn test_confirmation_revalidates_against_current_policy() {
        let engine = spy_engine(PolicyTables::default());
        let outcome = engine.submit("mkdir build").await.unwrap();
        assert!(outcome.needs_confirmation());

        engine.replace_policy(PolicyTables::default().with_blocked(["mkdir"]));

        let outcome = engine.execute_confirmed("mkdir build").await.unwrap();
        assert!(outcome.blocked());
        assert_eq!(calls(&engine), 0);
    }

    #[tokio::test]
    async fn test_every_call_records_one_entry() {
        let engine = spy_engine(PolicyTables::default());
        let inputs = ["pwd", "rm -rf /", "mkdir a", "unknown-tool", "echo hi"];
        for raw in inputs {
            engine.submit(raw).await.unwrap();
        }
        engine.execute_confirmed("mkdir a").await.unwrap();
        assert_eq!(engine.history(100).len(), inputs.len() + 1);

        engine.clear_history().unwrap();
        assert!(engine.history(100).is_empty());
        engine.submit("pwd").await.unwrap();
        assert_eq!(engine.history(100).len(), 1);
    }

    #[tokio::test]
    async fn test_parse_error_is_returned_without_history() {
        let engine = spy_engine(PolicyTables::default());
        assert_eq!(engine.submit("   ").await, Err(ParseError::Empty));
        assert!(matches!(
            engine.submit("echo 'oops").await,
            Err(ParseError::Malformed { .. })
        ));
        assert!(engine.history(10).is_empty());
        assert_eq!(calls(&engine), 0);
    }

    #[tokio::test]
    async fn test_dropped_call_records_cancelled_entry() {
        let audit = Arc::new(AuditLog::from_writer(std::io::sink()));
        let engine = CommandEngine::with_executor(PolicyTables::default(), audit, StuckExecutor);

        let elapsed = tokio::time::timeout(Duration::from_millis(50), engine.submit("ls")).await;
        assert!(elapsed.is_err());

        let history = engine.history(10);
        assert_eq!(history.len(), 1);
        let result = history[0].result().unwrap();
        assert!(result.was_cancelled());
        assert!(!result.succeeded());
    }

    #[tokio::test]
    async fn test_history_preserves_decision_and_result() {
        let engine = spy_engine(PolicyTables::default());
        engine.submit("whoami").await.unwrap();

        let history = engine.history(1);
        let entry = &history[0];
        assert_eq!(entry.command().executable(), "whoami");
        assert_eq!(entry.decision().outcome(), PolicyOutcome::Allowed);
        assert!(entry.succeeded());
    }
}
