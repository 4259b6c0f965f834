//! Sandbox abstraction for running the solver.
//!
//! A [`Sandbox`] executes one [`Command`] at a time per call and reports the
//! captured diagnostic stream together with the exit status. The harness only
//! ships a local implementation ([`local::LocalSandbox`]), but the
//! orchestrator is generic over the trait so tests can substitute scripted
//! sandboxes.
//!
//! ```text
//!   CaseRunner ── exec(Command) ──► Sandbox
//!                                     │  stdin  ◄── case input file
//!                                     │  stdout ──► case output file
//!                                     │  stderr ──► ExecResult.stderr
//!                                     ▼
//!                                 ExecResult
//! ```
//!
//! # Error Handling
//!
//! A command that runs but exits non-zero is NOT an error: it yields an
//! [`ExecResult`] with the exit code. [`ProviderError`] is reserved for
//! commands that could not be started, whose redirections could not be
//! opened, or that were killed on timeout. A timeout kills everything the
//! command started, not only the shell.

pub mod local;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

/// Result type for sandbox operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur while executing a command.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The command could not be spawned or waited on.
    #[error("Failed to execute command: {0}")]
    ExecFailed(String),

    /// The command exceeded its hard timeout and was killed.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// I/O error opening a redirection target.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A command to execute in a sandbox.
///
/// Commands are built using a fluent builder API. `program` is passed to the
/// shell verbatim, so it carries its own arguments and quoting.
///
/// # Example
///
/// ```
/// use mtest::provider::Command;
///
/// let cmd = Command::new("./solver --seed 1")
///     .stdin_file("tools/in/0000.txt")
///     .stdout_file("tools/out/0000.txt")
///     .timeout(10);
///
/// assert_eq!(cmd.program, "./solver --seed 1");
/// assert_eq!(cmd.timeout_secs, Some(10));
/// ```
#[derive(Debug, Clone)]
pub struct Command {
    /// Shell snippet to run.
    pub program: String,

    /// File bound to stdin. `None` means no input (null device).
    pub stdin_file: Option<PathBuf>,

    /// File stdout is written to (created or truncated). `None` captures
    /// stdout into [`ExecResult::stdout`].
    pub stdout_file: Option<PathBuf>,

    /// Hard bound on execution time in seconds.
    pub timeout_secs: Option<u64>,
}

impl Command {
    /// Creates a new command running the given shell snippet.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            stdin_file: None,
            stdout_file: None,
            timeout_secs: None,
        }
    }

    /// Binds stdin to the given file.
    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin_file = Some(path.into());
        self
    }

    /// Redirects stdout to the given file.
    pub fn stdout_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_file = Some(path.into());
        self
    }

    /// Sets the hard execution timeout in seconds.
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Result of executing a command in a sandbox.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Exit code of the command; `-1` if it was terminated by a signal.
    pub exit_code: i32,

    /// Captured standard output (empty when redirected to a file).
    pub stdout: String,

    /// Captured standard error, the solver's diagnostic stream.
    pub stderr: String,

    /// Wall-clock time the command took to execute.
    pub duration: Duration,
}

impl ExecResult {
    /// Returns `true` if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// An execution environment for solver commands.
///
/// # Thread Safety
///
/// Sandboxes are shared by reference across all concurrently running cases,
/// so they must be `Sync` and `exec` must not rely on exclusive state.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Returns the identifier used in logs.
    fn id(&self) -> &str;

    /// Runs a command to completion and returns its captured output.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Io` - a redirection file could not be opened
    /// - `ProviderError::ExecFailed` - the process could not be spawned
    /// - `ProviderError::Timeout` - the command's timeout expired
    async fn exec(&self, cmd: &Command) -> ProviderResult<ExecResult>;
}
