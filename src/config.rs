//! Configuration loading and schema definitions for mtest.
//!
//! This module provides types and functions for loading mtest configuration
//! from TOML files or strings. Every setting has a default, so the harness
//! runs without any file as long as a benchmark root is supplied.

pub mod schema;

pub use schema::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Loads mtest configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read (e.g., doesn't exist or permission denied)
/// - The file contains invalid TOML syntax
/// - The configuration doesn't match the expected schema
///
/// # Example
///
/// ```no_run
/// use mtest::config::load_config;
/// use std::path::Path;
///
/// let config = load_config(Path::new("mtest.toml"))?;
/// println!("Cases: {}", config.harness.case_count);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Loads mtest configuration from a TOML string.
///
/// # Example
///
/// ```
/// use mtest::config::load_config_str;
///
/// let config = load_config_str(r#"
///     [harness]
///     time_limit_secs = 2.0
/// "#)?;
///
/// assert_eq!(config.harness.time_limit_secs, 2.0);
/// assert_eq!(config.harness.case_count, 100);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;

    Ok(config)
}

/// Expands `~` and environment variables in a configured path.
///
/// Paths that fail to expand (an unset variable, say) are returned unchanged.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => path.to_path_buf(),
    }
}
