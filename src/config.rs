use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub s3: S3Config,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Optional schema to create and use for the artifact table
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// Tuning for upload, delete and download orchestration
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Extension appended to every storage key, e.g. ".pth"
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,
    /// Total attempts for a store call that fails with a transient error
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,
    /// Fraction of each delay randomized in both directions (0.0 - 1.0)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl LifecycleConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            artifact_extension: default_artifact_extension(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
            jitter: default_jitter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    /// SQLite file holding detected orphan objects and dangling records
    #[serde(default = "default_reconciliation_db_path")]
    pub db_path: String,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            db_path: default_reconciliation_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub path: String,
    /// Maximum size of a single log file in megabytes
    #[serde(default = "default_log_size")]
    pub size: u64,
    #[serde(default = "default_log_max_files")]
    pub max_files: usize,
}

fn default_max_connections() -> u32 {
    10
}

fn default_artifact_extension() -> String {
    ".pth".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_backoff_factor() -> u32 {
    2
}

fn default_jitter() -> f64 {
    0.25
}

fn default_reconciliation_db_path() -> String {
    "data/reconciliation.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_size() -> u64 {
    10
}

fn default_log_max_files() -> usize {
    5
}

pub fn load_config(path: &str) -> Result<Config> {
    let config_text = fs::read_to_string(Path::new(path))?;
    let config: Config = toml::from_str(&config_text)?;
    Ok(config)
}
