//! Local process sandbox.
//!
//! Runs each command as a child process of the harness through the
//! configured shell, with the benchmark root as working directory.
//!
//! # Characteristics
//!
//! | Feature | Support |
//! |---------|---------|
//! | Isolation | None (shared filesystem and network) |
//! | stdin / stdout | Bound to files, resolved against the working directory |
//! | stderr | Captured in memory |
//! | Hard timeout | Optional, per command (the whole process group is killed) |
//!
//! # Example Usage
//!
//! ```no_run
//! use mtest::provider::local::LocalSandbox;
//! use mtest::provider::{Command, Sandbox};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sandbox = LocalSandbox::new("local", "/work/ahc046", "/bin/sh");
//!     let cmd = Command::new("./target/release/a")
//!         .stdin_file("tools/in/0000.txt")
//!         .stdout_file("tools/out/0000.txt");
//!
//!     let result = sandbox.exec(&cmd).await?;
//!     eprintln!("{}", result.stderr);
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tracing::warn;

use super::{Command, ExecResult, ProviderError, ProviderResult, Sandbox};

/// A sandbox that runs commands as local child processes.
pub struct LocalSandbox {
    id: String,
    working_dir: PathBuf,
    env: Vec<(String, String)>,
    shell: String,
}

impl LocalSandbox {
    /// Creates a sandbox rooted at `working_dir`, running commands with
    /// `<shell> -c`.
    pub fn new(
        id: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        shell: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            working_dir: working_dir.into(),
            env: Vec::new(),
            shell: shell.into(),
        }
    }

    /// Adds environment variables applied to every command.
    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(env.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// Kills every process in the group led by `pgid`.
///
/// The group may already be gone when the shell and its children exited
/// between the timeout firing and this call.
fn kill_process_group(pgid: u32) {
    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group {}: {}", pgid, e),
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    async fn exec(&self, cmd: &Command) -> ProviderResult<ExecResult> {
        let start = Instant::now();

        let mut process = tokio::process::Command::new(&self.shell);
        process.arg("-c").arg(&cmd.program);
        process.current_dir(&self.working_dir);

        for (key, value) in &self.env {
            process.env(key, value);
        }

        let stdin = match &cmd.stdin_file {
            Some(path) => {
                let file = tokio::fs::File::open(self.working_dir.join(path)).await?;
                Stdio::from(file.into_std().await)
            }
            None => Stdio::null(),
        };
        let stdout = match &cmd.stdout_file {
            Some(path) => {
                let file = tokio::fs::File::create(self.working_dir.join(path)).await?;
                Stdio::from(file.into_std().await)
            }
            None => Stdio::piped(),
        };

        process.stdin(stdin);
        process.stdout(stdout);
        process.stderr(Stdio::piped());
        // The shell leads its own group so a timeout reaches the solver too.
        process.process_group(0);
        process.kill_on_drop(true);

        let child = process
            .spawn()
            .map_err(|e| ProviderError::ExecFailed(e.to_string()))?;
        let pgid = child.id();

        let output = if let Some(timeout) = cmd.timeout_secs {
            match tokio::time::timeout(Duration::from_secs(timeout), child.wait_with_output())
                .await
            {
                Ok(output) => output.map_err(|e| ProviderError::ExecFailed(e.to_string()))?,
                Err(_) => {
                    if let Some(pgid) = pgid {
                        kill_process_group(pgid);
                    }
                    return Err(ProviderError::Timeout(format!(
                        "Command timed out after {}s",
                        timeout
                    )));
                }
            }
        } else {
            child
                .wait_with_output()
                .await
                .map_err(|e| ProviderError::ExecFailed(e.to_string()))?
        };

        Ok(ExecResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox(dir: &TempDir) -> LocalSandbox {
        LocalSandbox::new("test", dir.path(), "/bin/sh")
    }

    #[tokio::test]
    async fn test_exec_captures_stderr_and_stdout() {
        let dir = TempDir::new().unwrap();
        let cmd = Command::new("echo out; echo 'score 7' >&2");

        let result = sandbox(&dir).exec(&cmd).await.unwrap();

        assert!(result.success());
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "score 7\n");
    }

    #[tokio::test]
    async fn test_exec_redirects_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("in")).unwrap();
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        std::fs::write(dir.path().join("in/0000.txt"), "3 4\n").unwrap();

        let cmd = Command::new("read a b; echo $((a + b)); echo done >&2")
            .stdin_file("in/0000.txt")
            .stdout_file("out/0000.txt");

        let result = sandbox(&dir).exec(&cmd).await.unwrap();

        assert!(result.success());
        assert!(result.stdout.is_empty());
        assert_eq!(result.stderr, "done\n");
        let written = std::fs::read_to_string(dir.path().join("out/0000.txt")).unwrap();
        assert_eq!(written, "7\n");
    }

    #[tokio::test]
    async fn test_exec_nonzero_exit_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let cmd = Command::new("echo 'score 3' >&2; exit 101");

        let result = sandbox(&dir).exec(&cmd).await.unwrap();

        assert_eq!(result.exit_code, 101);
        assert_eq!(result.stderr, "score 3\n");
    }

    #[tokio::test]
    async fn test_exec_missing_input_file() {
        let dir = TempDir::new().unwrap();
        let cmd = Command::new("cat").stdin_file("in/missing.txt");

        let err = sandbox(&dir).exec(&cmd).await.unwrap_err();

        assert!(matches!(err, ProviderError::Io(_)));
    }

    #[tokio::test]
    async fn test_exec_timeout() {
        let dir = TempDir::new().unwrap();
        let cmd = Command::new("sleep 5").timeout(1);

        let err = sandbox(&dir).exec(&cmd).await.unwrap_err();

        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_exec_timeout_kills_descendants() {
        let dir = TempDir::new().unwrap();
        let cmd = Command::new("sh -c 'sleep 2; echo late > marker.txt'; true").timeout(1);

        let err = sandbox(&dir).exec(&cmd).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!dir.path().join("marker.txt").exists());
    }

    #[tokio::test]
    async fn test_exec_env() {
        let dir = TempDir::new().unwrap();
        let cmd = Command::new("echo \"$BASE $EXTRA\" >&2");

        let result = sandbox(&dir)
            .with_env([("BASE", "one"), ("EXTRA", "two")])
            .exec(&cmd)
            .await
            .unwrap();

        assert_eq!(result.stderr, "one two\n");
    }
}
