//! Configuration loading and database path resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the play-count table
pub const TRACKS_TABLE_ENV: &str = "SPOTIFY_TRACKS_TABLE";
/// Environment variable naming the JSON secret blob with catalog credentials
pub const SECRETS_ENV: &str = "SPOTIFY_SECRETS";
/// Environment variable overriding the database path
pub const DATABASE_ENV: &str = "DATAFY_DATABASE";

const CONFIG_FILE_NAME: &str = "datafy-sync.toml";

/// Top-level configuration for datafy-sync
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// SQLite database holding the play-count and track tables
    pub database_path: Option<PathBuf>,
    pub catalog: CatalogConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

/// Catalog API endpoints and request policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Base URL of the accounts service (token endpoint is `/api/token`)
    pub accounts_base_url: String,
    /// Base URL of the web API (`/v1/tracks/{id}`, `/v1/audio-features/{id}`)
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Upper bound applied to a server-provided `Retry-After`
    pub max_retry_after_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            accounts_base_url: "https://accounts.spotify.com".to_string(),
            api_base_url: "https://api.spotify.com".to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            max_retry_after_secs: 30,
        }
    }
}

/// Longest accepted recency window (100 years)
pub const MAX_RECENCY_DAYS: i64 = 36_500;

/// Job behaviour shared by every subcommand
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Play-count table name
    pub playcount_table: String,
    /// Recency window for the mood tracker
    pub recency_days: i64,
    /// Maximum in-flight catalog fetches per run
    pub max_concurrency: usize,
    /// Per-run deadline; in-flight fetches are cancelled when it elapses
    pub run_timeout_secs: u64,
    /// JSON secret blob with `spotify_client_id` / `spotify_secret`
    pub secrets_file: Option<PathBuf>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            playcount_table: "playcount".to_string(),
            recency_days: 7,
            max_concurrency: 8,
            run_timeout_secs: 600,
            secrets_file: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive used when RUST_LOG is unset
    pub level: String,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}

impl SyncConfig {
    /// Load configuration from an explicit path, the default location, or defaults
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply environment overrides (priority 2)
    pub fn apply_env_overrides(&mut self) {
        if let Some(table) = non_empty_env(TRACKS_TABLE_ENV) {
            self.jobs.playcount_table = table;
        }
        if let Some(path) = non_empty_env(SECRETS_ENV) {
            self.jobs.secrets_file = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty_env(DATABASE_ENV) {
            self.database_path = Some(PathBuf::from(path));
        }
    }

    /// Reject values the jobs cannot run with
    pub fn validate(&self) -> Result<()> {
        crate::db::validate_identifier(&self.jobs.playcount_table)?;

        if self.jobs.recency_days <= 0 || self.jobs.recency_days > MAX_RECENCY_DAYS {
            return Err(Error::Config(format!(
                "recency_days must be between 1 and {}, got {}",
                MAX_RECENCY_DAYS, self.jobs.recency_days
            )));
        }
        if self.jobs.max_concurrency == 0 {
            return Err(Error::Config("max_concurrency must be at least 1".to_string()));
        }
        if self.jobs.run_timeout_secs == 0 {
            return Err(Error::Config("run_timeout_secs must be at least 1".to_string()));
        }
        for (name, url) in [
            ("accounts_base_url", &self.catalog.accounts_base_url),
            ("api_base_url", &self.catalog.api_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!("{} must be an http(s) URL: {}", name, url)));
            }
        }
        Ok(())
    }

    /// Resolve the database path: CLI argument, then config/env, then default
    pub fn resolve_database_path(&self, cli_arg: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        default_database_path()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Default config file location (`~/.config/datafy/datafy-sync.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("datafy").join(CONFIG_FILE_NAME))
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("datafy").join("datafy.db"))
        .unwrap_or_else(|| PathBuf::from("./datafy_data/datafy.db"))
}
