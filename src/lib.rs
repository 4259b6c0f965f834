//! mtest: a parallel benchmark harness for heuristic contest solvers.
//!
//! The harness runs a solver against a numbered battery of input files, one
//! process per case and one case per CPU at a time, reads the score, elapsed
//! time and count the solver reports on stderr, and writes a per-case summary
//! table with score and log-score totals.
//!
//! # Architecture
//!
//! The main components are:
//!
//! - **Case**: Enumerate cases and derive their input/output paths
//! - **Provider**: Run solver commands with redirected stdin/stdout
//! - **Metrics**: Parse the solver's diagnostic stream
//! - **Orchestrator**: Dispatch cases concurrently and collect results in order
//! - **Report**: Aggregate, persist and print the summary
//!
//! # Example
//!
//! ```no_run
//! use mtest::config::load_config;
//! use mtest::orchestrator::Orchestrator;
//! use mtest::provider::local::LocalSandbox;
//! use mtest::report::ConsoleReporter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config(std::path::Path::new("mtest.toml"))?;
//!     let Some(root) = config.root.clone() else {
//!         return Ok(());
//!     };
//!
//!     let sandbox = LocalSandbox::new("local", root, &config.solver.shell);
//!     let orchestrator = Orchestrator::new(config, sandbox, ConsoleReporter::new());
//!     orchestrator.run("a").await?;
//!     Ok(())
//! }
//! ```

pub mod case;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod provider;
pub mod report;

// Re-export commonly used types
pub use case::TestCase;
pub use config::{Config, load_config};
pub use metrics::{DiagnosticParser, DiagnosticProtocol, RunMetrics};
pub use orchestrator::{CaseFailure, CaseResult, Orchestrator, RunResult};
pub use provider::Sandbox;
pub use report::{Reporter, SummaryReport, SummaryRow};
