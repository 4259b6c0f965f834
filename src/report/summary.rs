//! Aggregation of per-case metrics into the summary table.
//!
//! Rows are kept in case order. The persisted table carries the case id as
//! an unnamed index column, and floats always keep a fractional part:
//!
//! ```text
//! ,score,log_score
//! 0,100,6.643856189774724
//! 1,0,0.0
//! ```
//!
//! The delimiter follows the file extension: `tsv` gets tabs, anything else
//! gets commas.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::metrics::RunMetrics;
use crate::orchestrator::CaseResult;

/// Base-2 logarithm of a score.
///
/// A zero score has no logarithm; it is mapped to `0.0` so that it
/// contributes nothing to the log total and the sum stays finite.
pub fn log_score(score: u64) -> f64 {
    if score == 0 {
        0.0
    } else {
        (score as f64).log2()
    }
}

/// One row of the summary table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryRow {
    pub score: u64,
    pub log_score: f64,
}

impl From<&RunMetrics> for SummaryRow {
    fn from(metrics: &RunMetrics) -> Self {
        Self {
            score: metrics.score,
            log_score: log_score(metrics.score),
        }
    }
}

/// Summary rows in case order together with their column totals.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryReport {
    pub rows: Vec<SummaryRow>,
    /// Sum of the scores. Wider than a single score so it cannot overflow.
    pub score_sum: u128,
    pub log_score_sum: f64,
}

impl SummaryReport {
    /// Builds a report from rows already in case order.
    pub fn from_rows(rows: Vec<SummaryRow>) -> Self {
        let (score_sum, log_score_sum) = sum_rows(&rows);
        Self {
            rows,
            score_sum,
            log_score_sum,
        }
    }

    /// Builds a report from slot-ordered case results.
    ///
    /// # Example
    ///
    /// ```
    /// use mtest::case::TestCase;
    /// use mtest::config::CaseConfig;
    /// use mtest::metrics::RunMetrics;
    /// use mtest::orchestrator::CaseResult;
    /// use mtest::report::summary::SummaryReport;
    ///
    /// let layout = CaseConfig::default();
    /// let results: Vec<CaseResult> = (0..3)
    ///     .map(|id| CaseResult {
    ///         case: TestCase::new(id, &layout),
    ///         metrics: RunMetrics { score: 8, ..Default::default() },
    ///         failure: None,
    ///     })
    ///     .collect();
    ///
    /// let report = SummaryReport::from_results(&results);
    /// assert_eq!(report.score_sum, 24);
    /// assert_eq!(report.log_score_sum, 9.0);
    /// ```
    pub fn from_results(results: &[CaseResult]) -> Self {
        Self::from_rows(
            results
                .iter()
                .map(|r| SummaryRow::from(&r.metrics))
                .collect(),
        )
    }

    /// Re-sums the rows, independently of the stored totals.
    pub fn recompute(&self) -> (u128, f64) {
        sum_rows(&self.rows)
    }

    /// Renders the table as CSV.
    pub fn to_csv(&self) -> String {
        self.to_table(',')
    }

    /// Renders the table with the given field delimiter.
    pub fn to_table(&self, delimiter: char) -> String {
        let d = delimiter;
        let mut out = format!("{d}score{d}log_score\n");
        for (idx, row) in self.rows.iter().enumerate() {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{idx}{d}{}{d}{:?}", row.score, row.log_score);
        }
        out
    }

    /// Writes the table to `path`, creating parent directories as needed.
    ///
    /// The delimiter is picked from the extension of `path`.
    pub fn write_table(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        std::fs::write(path, self.to_table(delimiter_for(path)))
            .with_context(|| format!("Failed to write summary table: {}", path.display()))
    }
}

fn delimiter_for(path: &Path) -> char {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => '\t',
        _ => ',',
    }
}

fn sum_rows(rows: &[SummaryRow]) -> (u128, f64) {
    rows.iter().fold((0, 0.0), |(score, log), row| {
        (score + u128::from(row.score), log + row.log_score)
    })
}
