//! Benchmark execution engine and orchestration.
//!
//! # Architecture
//!
//! ```text
//!   enumerate_cases()
//!         │
//!         ▼
//!   Vec<TestCase> ──► stream::iter ── buffered(workers) ──► Vec<CaseResult>
//!                           │                                   (slot order)
//!                           ▼                                        │
//!                tokio::spawn(CaseRunner)                            │
//!                           │                                        ▼
//!                   Sandbox.exec(cmd)                         SummaryReport
//!                           │                                        │
//!                DiagnosticParser.parse(stderr)               <solver>.csv
//!                           │                                        │
//!                Reporter.on_case_complete()            Reporter.on_run_complete()
//! ```
//!
//! # Execution Flow
//!
//! 1. **Enumeration**: Build the case list from the configuration
//! 2. **Dispatch**: Run at most one case per available CPU at a time, each in
//!    its own task
//! 3. **Barrier**: Wait for every case, successful or not
//! 4. **Aggregation**: Project results into the summary table, in case order
//! 5. **Reporting**: Persist the table and notify the reporter
//!
//! # Example
//!
//! ```no_run
//! use mtest::config::Config;
//! use mtest::orchestrator::Orchestrator;
//! use mtest::provider::local::LocalSandbox;
//! use mtest::report::ConsoleReporter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::default();
//!     config.root = Some("/work/ahc046".into());
//!
//!     let sandbox = LocalSandbox::new("local", "/work/ahc046", "/bin/sh");
//!     let orchestrator = Orchestrator::new(config, sandbox, ConsoleReporter::new());
//!
//!     let result = orchestrator.run("a").await?;
//!     println!("{} cases hit the time limit", result.tle());
//!     Ok(())
//! }
//! ```

pub mod runner;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use futures::stream::{self, StreamExt};
use tracing::info;

use crate::case::{TestCase, enumerate_cases};
use crate::config::Config;
use crate::metrics::{DiagnosticParser, RunMetrics};
use crate::provider::Sandbox;
use crate::report::{Reporter, SummaryReport};

pub use runner::{CaseRunner, render_command};

/// Why a case did not complete cleanly.
///
/// A failed case still carries metrics (zeroed, or whatever the solver
/// reported before exiting), so the summary table keeps one row per case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaseFailure {
    /// The solver could not be started or its files could not be opened.
    #[error("could not run solver: {0}")]
    Exec(String),

    /// The solver exited with a non-zero code (`-1` for a signal).
    #[error("solver exited with code {0}")]
    ExitStatus(i32),

    /// The solver was killed after the configured hard timeout.
    #[error("solver killed after {0}s")]
    Timeout(u64),
}

/// Outcome of a single case.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseResult {
    pub case: TestCase,
    pub metrics: RunMetrics,
    pub failure: Option<CaseFailure>,
}

/// Aggregated results of an entire benchmark run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Solver identifier the run was made with.
    pub solver: String,

    /// Per-case results; `results[i]` belongs to case `i`.
    pub results: Vec<CaseResult>,

    /// Summary rows and totals.
    pub report: SummaryReport,

    /// Where the summary table was written.
    pub table_path: PathBuf,

    /// Wall-clock duration of the entire run.
    pub duration: Duration,
}

impl RunResult {
    /// Number of cases whose reported elapsed time reached the limit.
    pub fn tle(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.metrics.exceeded_limit)
            .count()
    }

    /// Number of cases whose solver process failed.
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.failure.is_some()).count()
    }
}

/// Number of workers used for a run: one per available processing unit.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// The main orchestrator that coordinates a benchmark run.
///
/// # Type Parameters
///
/// - `S`: The sandbox type solver commands run in
/// - `R`: The reporter type
pub struct Orchestrator<S, R> {
    config: Config,
    sandbox: Arc<S>,
    reporter: Arc<R>,
    workers: usize,
}

impl<S, R> Orchestrator<S, R>
where
    S: Sandbox + 'static,
    R: Reporter + 'static,
{
    /// Creates a new orchestrator with the given components.
    ///
    /// # Arguments
    ///
    /// * `config` - Harness configuration; `root`, if set, must already be
    ///   expanded
    /// * `sandbox` - Sandbox solver commands run in
    /// * `reporter` - Reporter for progress and totals
    pub fn new(config: Config, sandbox: S, reporter: R) -> Self {
        Self {
            config,
            sandbox: Arc::new(sandbox),
            reporter: Arc::new(reporter),
            workers: available_workers(),
        }
    }

    #[cfg(test)]
    fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Runs every configured case with the given solver and aggregates the
    /// results.
    ///
    /// Individual case failures never abort the run; they are recorded in
    /// the corresponding [`CaseResult`].
    ///
    /// # Errors
    ///
    /// Returns an error if the case output directory cannot be created, a
    /// case task panicked, or the summary table cannot be written.
    pub async fn run(&self, solver: &str) -> anyhow::Result<RunResult> {
        let start = Instant::now();

        let cases = enumerate_cases(&self.config.cases, self.config.harness.case_count);

        if let Some(root) = &self.config.root {
            let output_dir = root.join(&self.config.cases.output_dir);
            tokio::fs::create_dir_all(&output_dir)
                .await
                .with_context(|| format!("Failed to create {}", output_dir.display()))?;
        }

        let parser = DiagnosticParser::new(
            self.config.solver.protocol,
            self.config.harness.time_limit_secs,
        );
        let command = render_command(&self.config.solver.command, solver);
        let runner = Arc::new(
            CaseRunner::new(Arc::clone(&self.sandbox), command, parser)
                .with_timeout(self.config.harness.case_timeout_secs),
        );

        info!(
            "Running {} cases with solver {} on {} workers",
            cases.len(),
            solver,
            self.workers
        );

        self.reporter.on_cases_ready(&cases).await;

        // `buffered` spawns a case only when a slot frees up and yields the
        // handles in case order.
        let handles: Vec<_> = stream::iter(cases)
            .map(|case| {
                let runner = Arc::clone(&runner);
                let reporter = Arc::clone(&self.reporter);
                tokio::spawn(async move {
                    let result = runner.run(&case).await;
                    reporter.on_case_complete(&result).await;
                    result
                })
            })
            .buffered(self.workers.max(1))
            .collect()
            .await;
        let results = handles
            .into_iter()
            .collect::<Result<Vec<CaseResult>, _>>()
            .context("Case task panicked")?;

        let report = SummaryReport::from_results(&results);
        let table_path = self.config.report.output_dir.join(format!(
            "{}.{}",
            solver, self.config.report.extension
        ));
        report.write_table(&table_path)?;

        info!(
            "Wrote {} rows to {} in {:?}",
            report.rows.len(),
            table_path.display(),
            start.elapsed()
        );

        let run_result = RunResult {
            solver: solver.to_string(),
            results,
            report,
            table_path,
            duration: start.elapsed(),
        };

        self.reporter.on_run_complete(&run_result).await;

        Ok(run_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::provider::{Command, ExecResult, ProviderError, ProviderResult};

    enum Scripted {
        Exit(i32, &'static str),
        SpawnError,
    }

    /// Sandbox answering each case from a script keyed by case id.
    struct ScriptedSandbox {
        script: Box<dyn Fn(usize) -> (Duration, Scripted) + Send + Sync>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedSandbox {
        fn new(script: impl Fn(usize) -> (Duration, Scripted) + Send + Sync + 'static) -> Self {
            Self {
                script: Box::new(script),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Sandbox for ScriptedSandbox {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn exec(&self, cmd: &Command) -> ProviderResult<ExecResult> {
            let id: usize = cmd
                .stdin_file
                .as_ref()
                .and_then(|p| p.file_stem())
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
                .expect("case input path");

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let (delay, outcome) = (self.script)(id);
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match outcome {
                Scripted::Exit(exit_code, stderr) => Ok(ExecResult {
                    exit_code,
                    stdout: String::new(),
                    stderr: stderr.to_string(),
                    duration: delay,
                }),
                Scripted::SpawnError => Err(ProviderError::ExecFailed("no such file".into())),
            }
        }
    }

    /// Reporter recording the order cases complete in.
    #[derive(Default)]
    struct RecordingReporter {
        completed: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Reporter for RecordingReporter {
        async fn on_cases_ready(&self, _cases: &[TestCase]) {}
        async fn on_case_complete(&self, result: &CaseResult) {
            self.completed.lock().unwrap().push(result.case.id);
        }
        async fn on_run_complete(&self, _result: &RunResult) {}
    }

    fn config(case_count: usize, report_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.harness.case_count = case_count;
        config.report.output_dir = report_dir.path().to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_uniform_solver_totals() {
        let dir = TempDir::new().unwrap();
        let sandbox =
            ScriptedSandbox::new(|_| (Duration::ZERO, Scripted::Exit(0, "score 100\nelapsed 0.50\n")));
        let orchestrator = Orchestrator::new(config(3, &dir), sandbox, RecordingReporter::default());

        let result = orchestrator.run("a").await.unwrap();

        assert_eq!(result.report.rows.len(), 3);
        assert_eq!(result.report.score_sum, 300);
        assert!((result.report.log_score_sum - 3.0 * 100f64.log2()).abs() < 1e-9);
        assert_eq!(result.tle(), 0);
        assert_eq!(result.failed(), 0);
        assert!(result.results.iter().all(|r| r.metrics.elapsed_secs == 0.5));

        assert_eq!(result.table_path, dir.path().join("a.csv"));
        let table = std::fs::read_to_string(&result.table_path).unwrap();
        assert_eq!(table.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_results_keep_case_order() {
        let dir = TempDir::new().unwrap();
        // Later cases finish first.
        let sandbox = ScriptedSandbox::new(|id| {
            (
                Duration::from_millis(10 * (8 - id as u64)),
                Scripted::Exit(0, match id % 2 {
                    0 => "score 2",
                    _ => "score 4",
                }),
            )
        });
        let orchestrator = Orchestrator::new(config(8, &dir), sandbox, RecordingReporter::default())
            .with_workers(4);

        let result = orchestrator.run("b").await.unwrap();

        let ids: Vec<usize> = result.results.iter().map(|r| r.case.id).collect();
        assert_eq!(ids, (0..8).collect::<Vec<_>>());
        let scores: Vec<u64> = result.report.rows.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![2, 4, 2, 4, 2, 4, 2, 4]);

        let completed = orchestrator.reporter.completed.lock().unwrap().clone();
        assert_eq!(completed.len(), 8);
        assert_ne!(completed, (0..8).collect::<Vec<_>>());
    }

    /// Reporter doing blocking work per completion and recording its thread.
    #[derive(Default)]
    struct BlockingReporter {
        threads: Mutex<std::collections::HashSet<std::thread::ThreadId>>,
    }

    #[async_trait]
    impl Reporter for BlockingReporter {
        async fn on_cases_ready(&self, _cases: &[TestCase]) {}
        async fn on_case_complete(&self, _result: &CaseResult) {
            std::thread::sleep(Duration::from_millis(50));
            self.threads
                .lock()
                .unwrap()
                .insert(std::thread::current().id());
        }
        async fn on_run_complete(&self, _result: &RunResult) {}
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cases_run_on_parallel_tasks() {
        let dir = TempDir::new().unwrap();
        let sandbox = ScriptedSandbox::new(|_| (Duration::ZERO, Scripted::Exit(0, "score 1")));
        let orchestrator = Orchestrator::new(config(8, &dir), sandbox, BlockingReporter::default())
            .with_workers(8);

        let start = Instant::now();
        let result = orchestrator.run("a").await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(result.report.score_sum, 8);
        let threads = orchestrator.reporter.threads.lock().unwrap().len();
        assert!(threads > 1, "all completions ran on one thread");
        assert!(elapsed < Duration::from_millis(400), "completions were serialized: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_concurrency_bounded_by_workers() {
        let dir = TempDir::new().unwrap();
        let sandbox =
            ScriptedSandbox::new(|_| (Duration::from_millis(5), Scripted::Exit(0, "score 1")));
        let orchestrator = Orchestrator::new(config(12, &dir), sandbox, RecordingReporter::default())
            .with_workers(3);

        orchestrator.run("a").await.unwrap();

        let max = orchestrator.sandbox.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "max in flight was {}", max);
        assert!(max >= 2, "cases never overlapped");
    }

    #[tokio::test]
    async fn test_failures_are_contained() {
        let dir = TempDir::new().unwrap();
        let sandbox = ScriptedSandbox::new(|id| {
            let outcome = match id {
                1 => Scripted::SpawnError,
                2 => Scripted::Exit(101, "score 5\nthread 'main' panicked\n"),
                _ => Scripted::Exit(0, "score 8\n"),
            };
            (Duration::ZERO, outcome)
        });
        let orchestrator = Orchestrator::new(config(4, &dir), sandbox, RecordingReporter::default());

        let result = orchestrator.run("a").await.unwrap();

        assert_eq!(result.failed(), 2);
        assert_eq!(result.results[0].failure, None);
        assert!(matches!(result.results[1].failure, Some(CaseFailure::Exec(_))));
        assert_eq!(result.results[1].metrics, RunMetrics::default());
        assert_eq!(result.results[2].failure, Some(CaseFailure::ExitStatus(101)));
        assert_eq!(result.results[2].metrics.score, 5);
        assert_eq!(result.report.score_sum, 8 + 5 + 8);
        assert_eq!(result.report.rows.len(), 4);
    }

    #[tokio::test]
    async fn test_time_limit_flag() {
        let dir = TempDir::new().unwrap();
        let sandbox = ScriptedSandbox::new(|_| (Duration::ZERO, Scripted::Exit(0, "elapsed 5.00\n")));
        let orchestrator = Orchestrator::new(config(1, &dir), sandbox, RecordingReporter::default());

        let result = orchestrator.run("a").await.unwrap();

        assert_eq!(result.tle(), 1);
        assert_eq!(result.results[0].metrics.elapsed_secs, 5.0);
        assert!(result.results[0].metrics.exceeded_limit);
    }

    #[tokio::test]
    async fn test_creates_output_dir_under_root() {
        let root = TempDir::new().unwrap();
        let report_dir = TempDir::new().unwrap();
        let mut config = config(0, &report_dir);
        config.root = Some(root.path().to_path_buf());
        let sandbox = ScriptedSandbox::new(|_| (Duration::ZERO, Scripted::Exit(0, "")));
        let orchestrator = Orchestrator::new(config, sandbox, RecordingReporter::default());

        let result = orchestrator.run("a").await.unwrap();

        assert!(root.path().join("tools/out").is_dir());
        assert!(result.results.is_empty());
        assert_eq!(result.report.score_sum, 0);
    }
}
