//! External command execution utilities.
//!
//! Builder-based API for running the external compiler as a tokio child
//! process with a timeout.
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! // Killed after the timeout or when the future is dropped
//! Cmd::from_slice(&["typst", "compile"])
//!     .args(["main.typ", "main.pdf"])
//!     .cwd(sandbox)
//!     .timeout(Duration::from_secs(60))
//!     .run_with_timeout()
//!     .await?;
//! ```

use crate::log;
use anyhow::{Context, Result};
use regex::Regex;
use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::{Output, Stdio},
    sync::LazyLock,
    time::Duration,
};

// ============================================================================
// Builder API
// ============================================================================

/// Command builder for external process execution.
#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    timeout: Option<Duration>,
    filter: Option<&'static FilterRule>,
}

impl Cmd {
    /// Create from a command array (e.g., `["typst"]` or `["mise", "exec", "typst"]`).
    pub fn from_slice<S: AsRef<OsStr>>(cmd: &[S]) -> Self {
        let mut iter = cmd.iter();
        let program = iter
            .next()
            .map(|s| s.as_ref().to_owned())
            .unwrap_or_default();
        let args: Vec<_> = iter.map(|s| s.as_ref().to_owned()).collect();
        Self {
            program,
            args,
            ..Default::default()
        }
    }

    /// Add a single argument. Empty arguments are dropped.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        let arg = arg.as_ref();
        if !arg.is_empty() {
            self.args.push(arg.to_owned());
        }
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Kill the process if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set output filter for logging.
    pub fn filter(mut self, filter: &'static FilterRule) -> Self {
        self.filter = Some(filter);
        self
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    /// Execute as a tokio child process.
    ///
    /// The child is killed when the timeout elapses or the returned future is
    /// dropped. A non-zero exit status is an error carrying the filtered
    /// compiler output.
    pub async fn run_with_timeout(self) -> Result<Output> {
        let name = self.program_name();
        let filter = self.filter.unwrap_or(&EMPTY_FILTER);

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn `{name}`"))?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| anyhow::anyhow!("`{name}` timed out after {}s", limit.as_secs()))?,
            None => child.wait_with_output().await,
        }
        .with_context(|| format!("Failed to wait for `{name}`"))?;

        log_output(&name, &output, filter)?;
        Ok(output)
    }
}

// ============================================================================
// Output Filtering
// ============================================================================

/// Filter rule for command output logging.
///
/// Used to reduce noise by skipping known warnings or irrelevant messages.
pub struct FilterRule {
    /// Prefixes to skip when logging output.
    pub skip_prefixes: &'static [&'static str],
}

impl FilterRule {
    pub const fn new(skip_prefixes: &'static [&'static str]) -> Self {
        Self { skip_prefixes }
    }

    fn should_skip(&self, line: &str) -> bool {
        line.is_empty() || self.skip_prefixes.iter().any(|p| line.starts_with(p))
    }

    /// Log output lines that pass the filter.
    pub fn log(&self, name: &str, output: &str) {
        let lines: Vec<_> = output
            .lines()
            .filter(|line| {
                let plain = strip_ansi(line);
                let trimmed = plain.trim();
                !trimmed.is_empty() && !self.should_skip(trimmed)
            })
            .collect();

        if !lines.is_empty() {
            log!(name; "{}", lines.join("\n"));
        }
    }
}

/// Empty filter (no skipping).
pub const EMPTY_FILTER: FilterRule = FilterRule::new(&[]);

// ============================================================================
// Helpers
// ============================================================================

static ANSI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());

/// Strip ANSI escape codes from string.
pub fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    ANSI.replace_all(s, "")
}

/// Log command output, returning error on failure.
fn log_output(name: &str, output: &Output, filter: &'static FilterRule) -> Result<()> {
    if !output.status.success() {
        anyhow::bail!(format_error(name, output, filter));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    filter.log(name, stderr.trim());
    Ok(())
}

/// Format error message for failed command.
fn format_error(name: &str, output: &Output, filter: &'static FilterRule) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);

    let error_msg = filter
        .skip_prefixes
        .iter()
        .fold(stderr.trim(), |s, p| s.trim_start_matches(p).trim_start());

    let mut msg = format!("`{name}` failed with {}", output.status);
    if !error_msg.is_empty() {
        msg.push('\n');
        msg.push_str(&strip_ansi(error_msg));
    }

    let stdout_trimmed = stdout.trim();
    if !stdout_trimmed.is_empty() {
        msg.push_str("\nStdout:\n");
        msg.push_str(stdout_trimmed);
    }
    msg
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_builder() {
        let cmd = Cmd::from_slice(&["typst", "compile"])
            .arg("main.typ")
            .args(["main.pdf", ""])
            .cwd("/tmp")
            .timeout(Duration::from_secs(5));

        assert_eq!(cmd.program, OsString::from("typst"));
        assert_eq!(cmd.args.len(), 3);
        assert_eq!(cmd.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(cmd.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_filter_rule() {
        let filter = FilterRule::new(&["warning:", "hint:"]);
        assert!(filter.should_skip("warning: unused"));
        assert!(filter.should_skip("hint: try"));
        assert!(!filter.should_skip("error: unknown variable"));
        assert!(filter.should_skip(""));
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_ansi("Plain text"), "Plain text");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_async_failure_carries_stderr() {
        let err = Cmd::from_slice(&["sh", "-c", "echo boom >&2; exit 3"])
            .run_with_timeout()
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("boom"), "{msg}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_async_timeout_kills_process() {
        let err = Cmd::from_slice(&["sleep", "5"])
            .timeout(Duration::from_millis(100))
            .run_with_timeout()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_async_missing_program() {
        let err = Cmd::from_slice(&["definitely-not-a-real-binary-xyz"])
            .run_with_timeout()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to spawn"));
    }
}
