//! Run reporting and summary output.
//!
//! Reporters receive events while a run progresses. The [`summary`] module
//! holds the aggregation that turns per-case metrics into the persisted
//! table.

pub mod summary;

use async_trait::async_trait;

use crate::case::TestCase;
use crate::orchestrator::{CaseResult, RunResult};

pub use summary::{SummaryReport, SummaryRow, log_score};

/// A reporter receives events during a benchmark run.
///
/// `on_case_complete` is called from concurrently running cases and carries
/// no ordering guarantee.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Called once the cases are enumerated, before any is dispatched.
    async fn on_cases_ready(&self, cases: &[TestCase]);

    /// Called as soon as a single case finishes.
    async fn on_case_complete(&self, result: &CaseResult);

    /// Called after every case has finished and the table is written.
    async fn on_run_complete(&self, result: &RunResult);
}

/// Formats the one-line status of a finished case.
///
/// ```
/// use mtest::case::TestCase;
/// use mtest::config::CaseConfig;
/// use mtest::metrics::RunMetrics;
/// use mtest::orchestrator::CaseResult;
/// use mtest::report::status_line;
///
/// let result = CaseResult {
///     case: TestCase::new(7, &CaseConfig::default()),
///     metrics: RunMetrics { score: 120, elapsed_secs: 3.5, count: 4, exceeded_limit: true },
///     failure: None,
/// };
/// assert_eq!(status_line(&result), "0007 score: 120, count: 4, elapsed: 3.5sec, TLE");
/// ```
pub fn status_line(result: &CaseResult) -> String {
    let metrics = &result.metrics;
    let mut line = format!(
        "{} score: {}, count: {}, elapsed: {}sec",
        result.case.name, metrics.score, metrics.count, metrics.elapsed_secs
    );
    if metrics.exceeded_limit {
        line.push_str(", TLE");
    }
    if let Some(failure) = &result.failure {
        line.push_str(&format!(", FAILED ({})", failure));
    }
    line
}

/// Console reporter that shows progress and per-case status in the terminal.
///
/// Status lines and totals go to stdout; the progress bar is drawn on stderr
/// and hidden automatically when stderr is not a terminal.
pub struct ConsoleReporter {
    progress: std::sync::Mutex<Option<indicatif::ProgressBar>>,
}

impl ConsoleReporter {
    /// Create a new console reporter.
    pub fn new() -> Self {
        Self {
            progress: std::sync::Mutex::new(None),
        }
    }

    fn print_above_progress(&self, line: &str) {
        let guard = self.progress.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(pb) => pb.suspend(|| println!("{}", line)),
            None => println!("{}", line),
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reporter for ConsoleReporter {
    async fn on_cases_ready(&self, cases: &[TestCase]) {
        let pb = indicatif::ProgressBar::new(cases.len() as u64);
        if let Ok(style) = indicatif::ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        *self.progress.lock().unwrap_or_else(|e| e.into_inner()) = Some(pb);
    }

    async fn on_case_complete(&self, result: &CaseResult) {
        let line = status_line(result);
        let styled = if result.failure.is_some() {
            console::style(line).red().to_string()
        } else if result.metrics.exceeded_limit {
            console::style(line).yellow().to_string()
        } else {
            line
        };

        self.print_above_progress(&styled);

        if let Some(pb) = self
            .progress
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            pb.inc(1);
        }
    }

    async fn on_run_complete(&self, result: &RunResult) {
        if let Some(pb) = self
            .progress
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            pb.finish_and_clear();
        }

        let tle = result.tle();
        if tle > 0 {
            println!("TLE: {}", console::style(tle).yellow());
        }
        let failed = result.failed();
        if failed > 0 {
            println!("Failed: {}", console::style(failed).red().bold());
        }

        println!("Score total: {}", result.report.score_sum);
        println!("Log score total: {:?}", result.report.log_score_sum);
    }
}
