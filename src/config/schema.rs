//! Configuration schema definitions for mtest.
//!
//! This module defines all configuration types that can be deserialized from
//! TOML configuration files. Every field carries a default, so an empty file
//! (or no file at all) yields a runnable configuration.
//!
//! # Schema Overview
//!
//! ```text
//! Config (root)
//! ├── root                   - Benchmark root directory (optional)
//! ├── HarnessConfig          - Case count, time limit, optional hard timeout
//! ├── CaseConfig             - Input/output directories and file naming
//! ├── SolverConfig           - Command template, shell, diagnostic protocol
//! └── ReportConfig           - Summary table location and extension
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::metrics::DiagnosticProtocol;

/// Placeholder in [`SolverConfig::command`] replaced by the solver identifier.
pub const SOLVER_PLACEHOLDER: &str = "{solver}";

/// Root configuration structure for mtest.
///
/// # TOML Structure
///
/// ```toml
/// root = "~/ahc/ahc046"
///
/// [harness]
/// case_count = 100
/// time_limit_secs = 3.0
///
/// [cases]
/// input_dir = "tools/in"
/// output_dir = "tools/out"
///
/// [solver]
/// command = "cargo run -r --features local --bin {solver}"
///
/// [report]
/// output_dir = "."
/// ```
///
/// # Example
///
/// ```
/// use mtest::config::Config;
///
/// let config: Config = toml::from_str(r#"
///     [harness]
///     case_count = 10
/// "#).unwrap();
/// assert_eq!(config.harness.case_count, 10);
/// assert!(config.root.is_none());
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Benchmark root directory.
    ///
    /// The solver runs with this as its working directory and case paths are
    /// resolved against it. When no root is configured anywhere (file, CLI,
    /// environment) the harness does nothing.
    pub root: Option<PathBuf>,

    /// Core harness settings.
    #[serde(default)]
    pub harness: HarnessConfig,

    /// Case file layout.
    #[serde(default)]
    pub cases: CaseConfig,

    /// How to invoke the solver and read its diagnostics.
    #[serde(default)]
    pub solver: SolverConfig,

    /// Where the summary table is written.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Core harness settings.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `case_count` | 100 |
/// | `time_limit_secs` | 3.0 |
/// | `case_timeout_secs` | None (wait forever) |
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarnessConfig {
    /// Number of cases to run, ids `0..case_count`.
    #[serde(default = "default_case_count")]
    pub case_count: usize,

    /// Reported elapsed time at or above which a case is flagged TLE.
    ///
    /// This is a reporting threshold only; the solver is never stopped
    /// because of it.
    #[serde(default = "default_time_limit")]
    pub time_limit_secs: f64,

    /// Hard wall-clock bound per solver invocation.
    ///
    /// When set, a solver still running after this many seconds is killed
    /// and the case is recorded as timed out. When unset, a hung solver
    /// stalls the whole run.
    #[serde(default)]
    pub case_timeout_secs: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            case_count: default_case_count(),
            time_limit_secs: default_time_limit(),
            case_timeout_secs: None,
        }
    }
}

fn default_case_count() -> usize {
    100
}

fn default_time_limit() -> f64 {
    3.0
}

/// Layout of the case files under the benchmark root.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaseConfig {
    /// Directory of input files, relative to the root.
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Directory the solver's stdout is written to, relative to the root.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Zero-padded width of the case file stem (`0007` for width 4).
    #[serde(default = "default_width")]
    pub width: usize,

    /// Case file extension, without the dot.
    #[serde(default = "default_case_extension")]
    pub extension: String,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            width: default_width(),
            extension: default_case_extension(),
        }
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("tools/in")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("tools/out")
}

fn default_width() -> usize {
    4
}

fn default_case_extension() -> String {
    "txt".to_string()
}

/// Solver invocation settings.
///
/// # Example
///
/// ```toml
/// [solver]
/// command = "./target/release/{solver}"
/// shell = "/bin/bash"
/// protocol = "key-value"
///
/// [solver.env]
/// RUST_BACKTRACE = "1"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolverConfig {
    /// Shell command template; `{solver}` is replaced by the quoted solver id.
    #[serde(default = "default_command")]
    pub command: String,

    /// Shell used to run the command (`<shell> -c <command>`).
    #[serde(default = "default_shell")]
    pub shell: String,

    /// How diagnostic lines are recognised.
    #[serde(default)]
    pub protocol: DiagnosticProtocol,

    /// Extra environment variables for every solver process.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            shell: default_shell(),
            protocol: DiagnosticProtocol::default(),
            env: HashMap::new(),
        }
    }
}

fn default_command() -> String {
    format!("cargo run -r --features local --bin {}", SOLVER_PLACEHOLDER)
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

/// Summary table settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Directory the `<solver>.<extension>` table is written to.
    ///
    /// Relative to the current directory, not the benchmark root.
    #[serde(default = "default_report_dir")]
    pub output_dir: PathBuf,

    /// Table file extension.
    #[serde(default = "default_table_extension")]
    pub extension: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_report_dir(),
            extension: default_table_extension(),
        }
    }
}

fn default_report_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_table_extension() -> String {
    "csv".to_string()
}
