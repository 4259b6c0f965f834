//! mtest CLI - run a solver over every benchmark case in parallel.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use mtest::config::{self, Config};
use mtest::orchestrator::Orchestrator;
use mtest::provider::local::LocalSandbox;
use mtest::report::ConsoleReporter;

/// Config file picked up from the current directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "mtest.toml";

#[derive(Parser)]
#[command(name = "mtest")]
#[command(about = "Run a solver over all benchmark cases in parallel", long_about = None)]
#[command(version)]
struct Cli {
    /// Solver identifier substituted into the command template
    #[arg(default_value = "a")]
    solver: String,

    /// Configuration file path (defaults to ./mtest.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Benchmark root directory; without one nothing is run
    #[arg(long, env = "MTEST_ROOT")]
    root: Option<PathBuf>,

    /// Override the number of cases
    #[arg(short = 'n', long)]
    cases: Option<usize>,

    /// Override the reported-time limit in seconds
    #[arg(long)]
    time_limit: Option<f64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the report.
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = load_config(cli.config.as_deref())?;

    if let Some(cases) = cli.cases {
        config.harness.case_count = cases;
    }
    if let Some(time_limit) = cli.time_limit {
        config.harness.time_limit_secs = time_limit;
    }

    let root = cli
        .root
        .filter(|p| !p.as_os_str().is_empty())
        .or_else(|| config.root.clone());
    let Some(root) = root else {
        debug!("No benchmark root configured, nothing to run");
        return Ok(());
    };
    let root = config::expand_path(&root);
    config.root = Some(root.clone());

    info!("Benchmark root: {}", root.display());
    println!("code name: {}.rs", cli.solver);

    let sandbox = LocalSandbox::new("local", &root, &config.solver.shell)
        .with_env(config.solver.env.clone());
    let orchestrator = Orchestrator::new(config, sandbox, ConsoleReporter::new());

    orchestrator.run(&cli.solver).await?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let default = Path::new(DEFAULT_CONFIG);
            if default.exists() {
                config::load_config(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}
