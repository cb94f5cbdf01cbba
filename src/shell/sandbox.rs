//! Environment construction for spawned commands.
//!
//! With sandboxing enabled a spawned command only sees a fixed set of seven
//! variables; otherwise it inherits a copy of the ambient environment. The
//! set is rebuilt for every execution because the working directory and
//! the ambient environment can change between calls.

use std::collections::BTreeMap;
use std::env;

/// Search path exposed inside the sandbox.
pub const SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";
/// Shell exposed inside the sandbox.
pub const SANDBOX_SHELL: &str = "/bin/sh";

/// Values used when the ambient variable is unset or empty.
pub const FALLBACK_HOME: &str = "/";
pub const FALLBACK_USER: &str = "unknown";
pub const FALLBACK_TERM: &str = "xterm";
pub const FALLBACK_LANG: &str = "en_US.UTF-8";

/// Variables visible to a sandboxed command.
pub const SANDBOX_VARS: [&str; 7] = ["PATH", "HOME", "USER", "SHELL", "TERM", "LANG", "PWD"];

/// Environment handed to the spawned process, ordered by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SandboxEnvironment {
    vars: BTreeMap<String, String>,
}

impl SandboxEnvironment {
    /// Build the environment for one execution.
    pub fn build(sandbox_enabled: bool) -> Self {
        if !sandbox_enabled {
            return Self::capture();
        }

        let mut vars = BTreeMap::new();
        vars.insert("PATH".to_string(), SANDBOX_PATH.to_string());
        vars.insert("HOME".to_string(), ambient_or("HOME", FALLBACK_HOME));
        vars.insert("USER".to_string(), ambient_or("USER", FALLBACK_USER));
        vars.insert("SHELL".to_string(), SANDBOX_SHELL.to_string());
        vars.insert("TERM".to_string(), ambient_or("TERM", FALLBACK_TERM));
        vars.insert("LANG".to_string(), ambient_or("LANG", FALLBACK_LANG));
        vars.insert("PWD".to_string(), current_dir_string());
        Self { vars }
    }

    /// Copy of the ambient process environment. Non-UTF-8 entries are skipped.
    pub fn capture() -> Self {
        let vars = env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl FromIterator<(String, String)> for SandboxEnvironment {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

fn ambient_or(name: &str, fallback: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn current_dir_string() -> String {
    env::current_dir()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "/".to_string())
}
