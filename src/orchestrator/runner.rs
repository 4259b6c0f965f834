//! Case runner: one solver invocation per case.
//!
//! The [`CaseRunner`] binds a case's input file to the solver's stdin, its
//! output file to stdout, captures stderr, and turns the captured text into
//! [`RunMetrics`]. Whatever happens to the process, a [`CaseResult`] comes
//! back; failures are recorded next to the (possibly partial) metrics instead
//! of being propagated.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mtest::case::TestCase;
//! use mtest::config::CaseConfig;
//! use mtest::metrics::{DiagnosticParser, DiagnosticProtocol};
//! use mtest::orchestrator::CaseRunner;
//! use mtest::provider::local::LocalSandbox;
//!
//! # async fn example() {
//! let sandbox = Arc::new(LocalSandbox::new("local", "/work/ahc046", "/bin/sh"));
//! let parser = DiagnosticParser::new(DiagnosticProtocol::Substring, 3.0);
//! let runner = CaseRunner::new(sandbox, "./target/release/a", parser);
//!
//! let result = runner.run(&TestCase::new(0, &CaseConfig::default())).await;
//! println!("score = {}", result.metrics.score);
//! # }
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use super::{CaseFailure, CaseResult};
use crate::case::TestCase;
use crate::config::SOLVER_PLACEHOLDER;
use crate::metrics::{DiagnosticParser, RunMetrics};
use crate::provider::{Command, ProviderError, Sandbox};

/// Substitutes the quoted solver identifier into a command template.
///
/// ```
/// use mtest::orchestrator::render_command;
///
/// assert_eq!(
///     render_command("cargo run -r --bin {solver}", "a"),
///     "cargo run -r --bin a"
/// );
/// assert_eq!(render_command("./{solver}", "my solver"), "./'my solver'");
/// ```
pub fn render_command(template: &str, solver: &str) -> String {
    template.replace(SOLVER_PLACEHOLDER, &shell_words::quote(solver))
}

/// Runs single cases in a sandbox and parses their diagnostics.
///
/// The sandbox is shared, so one runner can be handed to many tasks.
pub struct CaseRunner<S> {
    sandbox: Arc<S>,
    command: String,
    parser: DiagnosticParser,
    timeout_secs: Option<u64>,
}

impl<S: Sandbox> CaseRunner<S> {
    /// Creates a runner executing `command` (already rendered) for each case.
    pub fn new(sandbox: Arc<S>, command: impl Into<String>, parser: DiagnosticParser) -> Self {
        Self {
            sandbox,
            command: command.into(),
            parser,
            timeout_secs: None,
        }
    }

    /// Sets a hard per-case timeout; `None` waits for the solver forever.
    pub fn with_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Runs one case to completion.
    pub async fn run(&self, case: &TestCase) -> CaseResult {
        let mut cmd = Command::new(&self.command)
            .stdin_file(&case.input_path)
            .stdout_file(&case.output_path);
        if let Some(secs) = self.timeout_secs {
            cmd = cmd.timeout(secs);
        }

        debug!(
            "[{}] Running case {}: {}",
            self.sandbox.id(),
            case.name,
            cmd.program
        );

        let (metrics, failure) = match self.sandbox.exec(&cmd).await {
            Ok(exec) => {
                debug!(
                    "Case {} exited with code {} in {:?}",
                    case.name, exec.exit_code, exec.duration
                );
                // A crashed solver may still have reported something before dying.
                let metrics = self.parser.parse(&exec.stderr);
                let failure = (!exec.success()).then_some(CaseFailure::ExitStatus(exec.exit_code));
                (metrics, failure)
            }
            Err(ProviderError::Timeout(_)) => (
                RunMetrics::default(),
                Some(CaseFailure::Timeout(self.timeout_secs.unwrap_or_default())),
            ),
            Err(e) => (RunMetrics::default(), Some(CaseFailure::Exec(e.to_string()))),
        };

        if let Some(failure) = &failure {
            warn!("Case {} failed: {}", case.name, failure);
        }

        CaseResult {
            case: case.clone(),
            metrics,
            failure,
        }
    }
}
