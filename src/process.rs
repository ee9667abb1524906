//! Centralized command execution with consistent error handling.
//!
//! Every external program distkv-admin touches (`distkv`, `systemctl`,
//! `systemd-sysusers`) goes through [`Cmd`], so failures always carry the
//! program's stderr and the step that was running.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status of the command.
    pub status: ExitStatus,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl CommandResult {
    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Get the exit code, or -1 if terminated by signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// Get stdout, trimmed of whitespace.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Get stderr, trimmed of whitespace.
    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

/// Builder for configuring command execution.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    /// Custom error message prefix.
    error_prefix: Option<String>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            error_prefix: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Add a path as an argument.
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Set a custom error message prefix.
    pub fn error_msg(mut self, msg: impl AsRef<str>) -> Self {
        self.error_prefix = Some(msg.as_ref().to_string());
        self
    }

    /// Human-readable command line, for logs.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    fn failure_prefix(&self) -> String {
        self.error_prefix
            .clone()
            .unwrap_or_else(|| format!("'{}' failed", self.program))
    }

    /// Run the command and capture output.
    pub fn run(self) -> Result<CommandResult> {
        tracing::debug!(command = %self.display(), "running");

        let output = self.command().output().with_context(|| {
            format!("Failed to execute '{}'. Is it installed?", self.program)
        })?;

        let result = CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() {
            let prefix = self.failure_prefix();
            let stderr = result.stderr_trimmed();
            if stderr.is_empty() {
                bail!("{} (exit code {})", prefix, result.code());
            } else {
                bail!("{} (exit code {}):\n{}", prefix, result.code(), stderr);
            }
        }

        Ok(result)
    }

    /// Start the command in the background and return without waiting.
    ///
    /// Stdin is closed; stdout/stderr are inherited so the child's output
    /// still reaches the journal when run from a unit.
    pub fn spawn(self) -> Result<Child> {
        tracing::debug!(command = %self.display(), "spawning in background");

        let mut cmd = self.command();
        cmd.stdin(Stdio::null());

        cmd.spawn().with_context(|| {
            format!("Failed to spawn '{}'. Is it installed?", self.program)
        })
    }
}

// =============================================================================
// Convenience functions
// =============================================================================

/// Check if a program exists in PATH, or at the given path.
///
/// Returns the full path if found, None otherwise.
pub fn which(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

/// Check if a program exists in PATH (bool version).
pub fn exists(program: &str) -> bool {
    which(program).is_some()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_success() {
        let result = Cmd::new("echo").arg("hello").run().unwrap();
        assert!(result.success());
        assert_eq!(result.stdout_trimmed(), "hello");
    }

    #[test]
    fn test_run_failure_includes_stderr() {
        let err = Cmd::new("ls")
            .arg_path(Path::new("/nonexistent_path_12345"))
            .run()
            .unwrap_err();
        let msg = err.to_string();

        assert!(msg.contains("No such file") || msg.contains("cannot access"));
    }

    #[test]
    fn test_missing_program_mentions_install() {
        let err = Cmd::new("nonexistent_program_12345").run().unwrap_err();
        assert!(err.to_string().contains("Is it installed?"));
    }

    #[test]
    fn test_which() {
        assert!(which("sh").is_some());
        assert!(which("nonexistent_program_12345").is_none());
        assert!(exists("sh"));
    }

    #[test]
    fn test_custom_error_message() {
        let err = Cmd::new("false")
            .error_msg("distkv dump init failed")
            .run()
            .unwrap_err();

        assert!(err.to_string().contains("distkv dump init failed"));
    }

    #[test]
    fn test_failure_without_stderr_reports_exit_code() {
        let err = Cmd::new("false").run().unwrap_err();
        assert_eq!(err.to_string(), "'false' failed (exit code 1)");
    }

    #[test]
    fn test_spawn_does_not_block() {
        let mut child = Cmd::new("sh").args(["-c", "exit 3"]).spawn().unwrap();
        let status = child.wait().unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[test]
    fn test_display_joins_args() {
        let cmd = Cmd::new("systemctl").args(["enable", "distkv.service"]);
        assert_eq!(cmd.display(), "systemctl enable distkv.service");
    }
}
