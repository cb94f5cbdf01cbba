//! End-to-end tests through the public engine API with real processes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use rusty_gate::{
    parse, AuditLog, CommandEngine, EngineConfig, ParseError, PolicyOutcome, PolicyTables,
};

fn engine_with_log(dir: &tempfile::TempDir) -> CommandEngine {
    let audit = Arc::new(AuditLog::open(dir.path().join("commands.log")).unwrap());
    CommandEngine::new(PolicyTables::default(), audit)
}

#[test]
fn test_parse_splits_quoted_arguments() {
    let command = parse("echo \"a b\" c").unwrap();
    assert_eq!(command.executable(), "echo");
    assert_eq!(command.arguments(), ["a b", "c"]);
    assert_eq!(parse("  "), Err(ParseError::Empty));
}

#[tokio::test]
async fn test_pwd_prints_working_directory() {
    let dir = tempdir().unwrap();
    let engine = engine_with_log(&dir);

    let outcome = engine.submit("pwd").await.unwrap();
    assert!(outcome.succeeded());
    assert_eq!(outcome.exit_code(), 0);

    let cwd = std::env::current_dir().unwrap();
    assert_eq!(outcome.stdout().trim_end(), cwd.to_string_lossy());
}

#[tokio::test]
async fn test_rm_rf_root_is_blocked() {
    let dir = tempdir().unwrap();
    let engine = engine_with_log(&dir);

    let outcome = engine.submit("rm -rf /").await.unwrap();
    assert!(outcome.blocked());
    assert!(!outcome.succeeded());
    assert_eq!(outcome.decision().outcome(), PolicyOutcome::Blocked);

    let outcome = engine.execute_confirmed("rm -rf /").await.unwrap();
    assert!(outcome.blocked());
}

#[tokio::test]
async fn test_mkdir_waits_for_confirmation() {
    let dir = tempdir().unwrap();
    let engine = engine_with_log(&dir);
    let target = dir.path().join("testdir");
    let raw = format!("mkdir {}", target.display());

    let outcome = engine.submit(&raw).await.unwrap();
    assert!(outcome.needs_confirmation());
    assert!(!target.exists());

    let outcome = engine.execute_confirmed(&raw).await.unwrap();
    assert!(outcome.succeeded(), "stderr: {}", outcome.stderr());
    assert!(target.is_dir());
}

#[tokio::test]
async fn test_timeout_returns_promptly() {
    let dir = tempdir().unwrap();
    let engine = engine_with_log(&dir);

    // sleep is not allow-listed, so it goes through the confirmed path
    let started = Instant::now();
    let outcome = engine
        .execute_confirmed_with_timeout("sleep 10", Duration::from_millis(300))
        .await
        .unwrap();

    assert!(outcome.timed_out());
    assert!(!outcome.succeeded());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(outcome.stderr().contains("timed out"));
}

#[tokio::test]
async fn test_cancelled_call_is_killed_and_recorded() {
    let dir = tempdir().unwrap();
    let engine = engine_with_log(&dir);
    let marker = dir.path().join("marker");
    let raw = format!("sleep 1; touch {}", marker.display());

    let elapsed = tokio::time::timeout(
        Duration::from_millis(200),
        engine.execute_confirmed_with_timeout(&raw, Duration::from_secs(10)),
    )
    .await;
    assert!(elapsed.is_err());

    tokio::time::sleep(Duration::from_millis(1600)).await;
    assert!(!marker.exists());

    let history = engine.history(10);
    assert_eq!(history.len(), 1);
    assert!(history[0].result().unwrap().was_cancelled());

    let content = std::fs::read_to_string(dir.path().join("commands.log")).unwrap();
    assert!(content.contains(" - ERROR - Cancelled: sleep 1; touch "));
}

#[tokio::test]
async fn test_durable_log_records_every_call() {
    let dir = tempdir().unwrap();
    let engine = engine_with_log(&dir);

    engine.submit("echo logged").await.unwrap();
    engine.submit("reboot").await.unwrap();
    engine.submit("touch nothing-here").await.unwrap();
    engine.submit("ls /definitely/not/here").await.unwrap();
    assert!(engine.submit("").await.is_err());

    assert_eq!(engine.history(10).len(), 4);

    let content = std::fs::read_to_string(dir.path().join("commands.log")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].contains(" - INFO - Executed successfully: echo logged"));
    assert!(lines[1].contains(" - WARNING - Blocked command: reboot"));
    assert!(lines[2].contains(" - INFO - Awaiting confirmation: touch nothing-here"));
    assert!(lines[3].contains(" - WARNING - Command failed: ls /definitely/not/here"));
    assert!(lines[4].contains(" - WARNING - Parse failure:"));
}

#[tokio::test]
async fn test_concurrent_submissions_each_get_an_entry() {
    let dir = tempdir().unwrap();
    let engine = Arc::new(engine_with_log(&dir));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.submit(&format!("echo job-{i}")).await })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.stdout(), format!("job-{i}\n"));
    }

    assert_eq!(engine.history(100).len(), 10);
    let content = std::fs::read_to_string(dir.path().join("commands.log")).unwrap();
    assert_eq!(content.lines().count(), 10);
}

#[tokio::test]
async fn test_engine_from_config() {
    let dir = tempdir().unwrap();
    let config = EngineConfig {
        log_path: dir.path().join("logs").join("gate.log"),
        sandbox_enabled: false,
        timeout_seconds: 2,
        blocked: Some(vec!["echo".to_string()]),
        ..EngineConfig::default()
    };

    let engine = CommandEngine::from_config(&config).unwrap();
    assert!(!engine.sandbox_enabled());
    assert_eq!(engine.default_timeout(), Duration::from_secs(2));

    let outcome = engine.submit("echo hi").await.unwrap();
    assert!(outcome.blocked());
    assert!(config.log_path.exists());
}

#[test]
fn test_unopenable_log_is_an_error() {
    let dir = tempdir().unwrap();
    // a directory cannot be opened as the log file
    assert!(AuditLog::open(dir.path()).is_err());
}
