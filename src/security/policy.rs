//! Command policy tables and classification.
//!
//! This module holds the three policy sets (blocked, confirmation required,
//! allowed) plus the dangerous-pattern list, and classifies parsed commands
//! against them.

use std::collections::BTreeSet;

use tracing::debug;

use super::{Command, PolicyDecision};

/// Executables that run without confirmation.
pub const DEFAULT_ALLOWED: &[&str] = &[
    "ls", "pwd", "whoami", "date", "uptime", "df", "free", "ps", "cat", "head", "tail", "grep",
    "find", "locate", "which", "echo", "wc", "sort", "uniq", "history", "id", "groups", "uname",
    "hostname", "env", "printenv", "mount", "lsblk", "lscpu", "lsmem", "lsusb", "lspci",
    "systemctl status", "journalctl", "dmesg", "netstat", "ss", "ip", "ping", "nslookup", "dig",
    "wget", "curl", "cd", "tree", "less", "more", "top", "htop", "iotop", "iostat", "vmstat",
    "lsof", "du", "tar", "gzip", "gunzip", "zip", "unzip",
];

/// Executables that need an explicit approval before running.
pub const DEFAULT_CONFIRM: &[&str] = &[
    "mkdir", "rmdir", "touch", "cp", "mv", "ln", "chmod", "chown", "sudo", "su", "apt", "yum",
    "dnf", "pacman", "git", "docker", "systemctl", "service", "killall", "npm", "pip", "pip3",
    "python", "python3", "node", "make", "cmake", "gcc", "g++", "javac", "java", "ssh", "scp",
    "rsync", "mount", "umount", "crontab",
];

/// Executables that never run.
pub const DEFAULT_BLOCKED: &[&str] = &[
    "rm", "dd", "mkfs", "fdisk", "parted", "format", "shutdown", "reboot", "halt", "init",
    "telinit",
];

/// Substrings that block a command wherever they appear (matched lower-cased).
pub const DEFAULT_DANGEROUS_PATTERNS: &[&str] = &[
    "> /dev/",
    "< /dev/",
    "rm -rf /",
    "&& rm -rf",
    "; rm -rf",
    "chmod 777 /",
    "chmod 666 /",
    "> /etc/passwd",
    "> /etc/shadow",
    "sudo rm -rf",
    "eval",
    "exec",
];

/// Immutable policy configuration.
///
/// Cheap to share behind an `Arc`; classification takes `&self` only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTables {
    blocked: BTreeSet<String>,
    confirm: BTreeSet<String>,
    allowed: BTreeSet<String>,
    dangerous_patterns: Vec<String>,
}

impl Default for PolicyTables {
    fn default() -> Self {
        Self::new(
            DEFAULT_BLOCKED.iter().copied(),
            DEFAULT_CONFIRM.iter().copied(),
            DEFAULT_ALLOWED.iter().copied(),
            DEFAULT_DANGEROUS_PATTERNS.iter().copied(),
        )
    }
}

impl PolicyTables {
    pub fn new<B, C, A, D>(blocked: B, confirm: C, allowed: A, dangerous_patterns: D) -> Self
    where
        B: IntoIterator,
        B::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            blocked: blocked.into_iter().map(Into::into).collect(),
            confirm: confirm.into_iter().map(Into::into).collect(),
            allowed: allowed.into_iter().map(Into::into).collect(),
            dangerous_patterns: dangerous_patterns
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Tables with every set empty. Every command then needs confirmation.
    pub fn empty() -> Self {
        Self::new(
            Vec::<String>::new(),
            Vec::<String>::new(),
            Vec::<String>::new(),
            Vec::<String>::new(),
        )
    }

    pub fn with_blocked<I: IntoIterator<Item = S>, S: Into<String>>(mut self, items: I) -> Self {
        self.blocked = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_confirm<I: IntoIterator<Item = S>, S: Into<String>>(mut self, items: I) -> Self {
        self.confirm = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allowed<I: IntoIterator<Item = S>, S: Into<String>>(mut self, items: I) -> Self {
        self.allowed = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dangerous_patterns<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        items: I,
    ) -> Self {
        self.dangerous_patterns = items
            .into_iter()
            .map(|p| p.into().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    pub fn blocked(&self) -> &BTreeSet<String> {
        &self.blocked
    }

    pub fn confirm(&self) -> &BTreeSet<String> {
        &self.confirm
    }

    pub fn allowed(&self) -> &BTreeSet<String> {
        &self.allowed
    }

    pub fn dangerous_patterns(&self) -> &[String] {
        &self.dangerous_patterns
    }

    /// Classify a parsed command.
    ///
    /// # Rules (first match wins)
    /// 1. Blocked set (exact, case-sensitive executable) → Blocked
    /// 2. Dangerous pattern anywhere in the command (case-insensitive) → Blocked
    /// 3. Confirmation set → AllowedPendingConfirmation
    /// 4. Allowed set (executable or whole command) → Allowed
    /// 5. Anything else → AllowedPendingConfirmation
    pub fn classify(&self, command: &Command) -> PolicyDecision {
        let executable = command.executable();

        if self.blocked.contains(executable) {
            debug!(executable, "blocked by policy set");
            return PolicyDecision::blocked(format!(
                "Command '{}' is blocked for security",
                executable
            ));
        }

        // Both spellings are scanned: the raw text keeps operators the way
        // they were typed, the re-joined form collapses repeated whitespace.
        let full_command = command.full_command();
        if let Some(pattern) = self.find_dangerous_pattern(&[command.raw(), &full_command]) {
            debug!(pattern, "dangerous pattern matched");
            return PolicyDecision::blocked(format!(
                "Command contains dangerous pattern: {}",
                pattern
            ));
        }

        if self.confirm.contains(executable) {
            return PolicyDecision::pending("Command requires user confirmation");
        }

        if self.allowed.contains(executable) || self.allowed.contains(&full_command) {
            return PolicyDecision::allowed("Command is in safe list");
        }

        PolicyDecision::pending("Unknown command, requires confirmation")
    }

    fn find_dangerous_pattern(&self, texts: &[&str]) -> Option<&str> {
        let lowered: Vec<String> = texts.iter().map(|t| t.to_lowercase()).collect();
        self.dangerous_patterns
            .iter()
            .find(|pattern| lowered.iter().any(|text| text.contains(pattern.as_str())))
            .map(String::as_str)
    }
}
