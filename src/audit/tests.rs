//! Tests for the audit log: ordering, severities, clearing and concurrency.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use super::AuditLog;
use crate::error::{AuditError, ParseError};
use crate::security::{parse, PolicyDecision};
use crate::shell::ExecutionResult;

/// Writer whose bytes can be inspected after being moved into the log.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct BrokenWriter;

impl Write for BrokenWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn memory_log() -> (AuditLog, SharedBuf) {
    let buf = SharedBuf::default();
    (AuditLog::from_writer(buf.clone()), buf)
}

fn allowed() -> PolicyDecision {
    PolicyDecision::allowed("Command is in safe list")
}

fn completed(code: i32) -> Option<ExecutionResult> {
    Some(ExecutionResult::completed(
        code,
        String::new(),
        String::new(),
        Duration::from_millis(3),
    ))
}

#[test]
fn test_severity_per_outcome() {
    let (log, buf) = memory_log();

    log.record(
        parse("rm -rf /").unwrap(),
        PolicyDecision::blocked("Command 'rm' is blocked for security"),
        None,
    )
    .unwrap();
    log.record(
        parse("mkdir x").unwrap(),
        PolicyDecision::pending("Command requires user confirmation"),
        None,
    )
    .unwrap();
    log.record(parse("ls").unwrap(), allowed(), completed(0)).unwrap();
    log.record(parse("ls nope").unwrap(), allowed(), completed(2)).unwrap();
    log.record(
        parse("sleep 9").unwrap(),
        allowed(),
        Some(ExecutionResult::timeout(
            String::new(),
            String::new(),
            Duration::from_millis(200),
        )),
    )
    .unwrap();
    log.record(
        parse("ls").unwrap(),
        allowed(),
        Some(ExecutionResult::spawn_failed(
            "Execution error: No such file or directory",
            Duration::ZERO,
        )),
    )
    .unwrap();

    let lines = buf.lines();
    assert_eq!(lines.len(), 6);
    assert!(lines[0].contains(" - WARNING - Blocked command: rm -rf / - Command 'rm' is blocked"));
    assert!(lines[1].contains(" - INFO - Awaiting confirmation: mkdir x"));
    assert!(lines[2].ends_with(" - INFO - Executed successfully: ls"));
    assert!(lines[3].ends_with(" - WARNING - Command failed: ls nope (exit code: 2)"));
    assert!(lines[4].contains(" - ERROR - Timeout: sleep 9"));
    assert!(lines[5].contains(" - ERROR - Error executing ls: Execution error:"));
    assert_eq!(log.len(), 6);
}

#[test]
fn test_query_returns_most_recent_in_order() {
    let (log, _buf) = memory_log();
    for i in 0..5 {
        log.record(parse(&format!("echo {i}")).unwrap(), allowed(), completed(0))
            .unwrap();
    }

    let recent: Vec<String> = log
        .query(3)
        .iter()
        .map(|e| e.command().raw().to_string())
        .collect();
    assert_eq!(recent, ["echo 2", "echo 3", "echo 4"]);
    assert_eq!(log.query(100).len(), 5);
}

#[test]
fn test_clear_keeps_durable_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("commands.log");
    let log = AuditLog::open(&path).unwrap();
    assert_eq!(log.path(), Some(path.as_path()));

    log.record(parse("pwd").unwrap(), allowed(), completed(0)).unwrap();
    log.record(parse("ls").unwrap(), allowed(), completed(0)).unwrap();
    log.clear().unwrap();

    assert!(log.is_empty());
    assert!(log.query(10).is_empty());

    log.record(parse("date").unwrap(), allowed(), completed(0)).unwrap();
    assert_eq!(log.len(), 1);

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].ends_with("Executed successfully: pwd"));
    assert!(lines[2].ends_with(" - INFO - Command history cleared"));
    assert!(lines[3].ends_with("Executed successfully: date"));
}

#[test]
fn test_reopen_appends() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("commands.log");

    AuditLog::open(&path)
        .unwrap()
        .record(parse("pwd").unwrap(), allowed(), completed(0))
        .unwrap();
    AuditLog::open(&path)
        .unwrap()
        .record(parse("ls").unwrap(), allowed(), completed(0))
        .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
}

#[test]
fn test_parse_failure_is_journaled_only() {
    let (log, buf) = memory_log();
    let err = parse("echo \"open").unwrap_err();
    log.record_parse_failure("echo \"open", &err).unwrap();

    assert!(log.is_empty());
    let lines = buf.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(" - WARNING - Parse failure: echo \"open - malformed command"));

    log.record_parse_failure("   ", &ParseError::Empty).unwrap();
    assert!(buf.lines()[1].ends_with("Parse failure:  - empty command"));
}

#[test]
fn test_write_failure_keeps_entry() {
    let log = AuditLog::from_writer(BrokenWriter);
    let result = log.record(parse("pwd").unwrap(), allowed(), completed(0));

    assert!(matches!(result, Err(AuditError::Write(_))));
    assert_eq!(log.len(), 1);
}

#[test]
fn test_concurrent_records_are_serialized() {
    let (log, buf) = memory_log();
    let log = Arc::new(log);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..25 {
                    let cmd = parse(&format!("echo t{t}-{i}")).unwrap();
                    log.record(cmd, allowed(), completed(0)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let entries = log.query(usize::MAX);
    assert_eq!(entries.len(), 200);

    // each thread's records keep their relative order
    for t in 0..8 {
        let prefix = format!("echo t{t}-");
        let seen: Vec<usize> = entries
            .iter()
            .filter_map(|e| e.command().raw().strip_prefix(prefix.as_str()))
            .map(|i| i.parse().unwrap())
            .collect();
        assert_eq!(seen, (0..25).collect::<Vec<_>>());
    }

    // journal order matches history order, one intact line per record
    let lines = buf.lines();
    assert_eq!(lines.len(), 200);
    for (entry, line) in entries.iter().zip(&lines) {
        assert!(line.ends_with(&format!("Executed successfully: {}", entry.command().raw())));
    }
}
