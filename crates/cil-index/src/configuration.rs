//! Configuration loading for the CIL index.
//!
//! Layered precedence, narrowest wins: CLI flags override the TOML
//! configuration file, which overrides built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::errors::Result;

const DEFAULT_CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_DB_FILE_NAME: &str = "index.sqlite3";

/// Resolved configuration for one run of the indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Path to the persistent SQLite-backed store.
    pub db_path: PathBuf,
    /// Lock-acquisition timeout for store writes, in seconds.
    pub busy_timeout_secs: u64,
    /// Default CIL search paths consulted by `--from-all-known`-adjacent
    /// tooling that the driver may add on top of explicit `FILES`.
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            busy_timeout_secs: 3600,
            search_paths: Vec::new(),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "cil-index")
}

fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join(DEFAULT_CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE_NAME))
}

fn default_db_path() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().join(DEFAULT_DB_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE_NAME))
}

impl IndexConfig {
    /// Load configuration from `path` (or the platform default config file
    /// if `path` is `None`), falling back to built-in defaults when no file
    /// is present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);

        if !config_path.exists() {
            trace!("no config file at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(config_path.clone()).required(false))
            .build()?;

        let mut loaded: IndexConfig = settings
            .try_deserialize()
            .unwrap_or_else(|_| Self::default());
        if loaded.db_path.as_os_str().is_empty() {
            loaded.db_path = default_db_path();
        }
        trace!("loaded config from {}", config_path.display());
        Ok(loaded)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}
