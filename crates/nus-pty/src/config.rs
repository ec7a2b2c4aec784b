use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Shell fallback when `$SHELL` is unset.
pub const FALLBACK_SHELL: &str = "/bin/bash";

/// Upper bound for a single read from the PTY master.
pub const DEFAULT_READ_BUF: usize = 4096;

/// How the bridged shell is launched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell program. `None` means the user's default shell.
    pub program: Option<String>,
    /// Start the shell as a login shell (`-l`).
    pub login: bool,
    pub cols: u16,
    pub rows: u16,
    /// Maximum bytes drained from the PTY per read.
    pub read_buf: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: None,
            login: true,
            cols: 80,
            rows: 24,
            read_buf: DEFAULT_READ_BUF,
        }
    }
}

impl ShellConfig {
    /// The program to exec, before path resolution.
    pub fn program(&self) -> String {
        self.program.clone().unwrap_or_else(default_shell)
    }

    /// Arguments passed to the shell.
    pub fn args(&self) -> Vec<&'static str> {
        if self.login {
            vec!["-l"]
        } else {
            Vec::new()
        }
    }
}

/// Returns the user's default shell, falling back to `/bin/bash`.
fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_SHELL.to_string())
}

/// Locate `program` the way `execvp` would.
///
/// Anything containing a `/` is taken as a path and must exist. Bare names are
/// looked up in each `PATH` entry.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }

    if program.contains('/') {
        let path = Path::new(program);
        return path.is_file().then(|| path.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
