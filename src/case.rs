//! Benchmark case enumeration.
//!
//! A case is identified by its index; its input and output files are derived
//! from the index zero-padded to a fixed width, e.g. case 7 with width 4 maps
//! to `tools/in/0007.txt` and `tools/out/0007.txt`.

use std::path::PathBuf;

use crate::config::CaseConfig;

/// A single benchmark case.
///
/// Paths are relative to the benchmark root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Position of the case in the enumeration, `0..case_count`.
    pub id: usize,

    /// Zero-padded file stem shared by the input and output files.
    pub name: String,

    /// Input file fed to the solver's stdin.
    pub input_path: PathBuf,

    /// File the solver's stdout is written to.
    pub output_path: PathBuf,
}

impl TestCase {
    /// Creates the descriptor for case `id` under the given layout.
    pub fn new(id: usize, layout: &CaseConfig) -> Self {
        let name = format!("{:0width$}", id, width = layout.width);
        let file_name = format!("{}.{}", name, layout.extension);

        Self {
            id,
            input_path: layout.input_dir.join(&file_name),
            output_path: layout.output_dir.join(&file_name),
            name,
        }
    }
}

/// Produces `count` cases with ids `0..count` in ascending order.
///
/// # Example
///
/// ```
/// use mtest::case::enumerate_cases;
/// use mtest::config::CaseConfig;
///
/// let cases = enumerate_cases(&CaseConfig::default(), 3);
/// assert_eq!(cases.len(), 3);
/// assert_eq!(cases[2].input_path, std::path::Path::new("tools/in/0002.txt"));
/// ```
pub fn enumerate_cases(layout: &CaseConfig, count: usize) -> Vec<TestCase> {
    (0..count).map(|id| TestCase::new(id, layout)).collect()
}
