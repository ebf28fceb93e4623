use crate::config::{load_config, Config, LifecycleConfig};
use crate::db::NewArtifactRecord;

/// Check if a test is enabled via environment variable
fn is_test_enabled(env_var: &str) -> bool {
    std::env::var(env_var)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Check if PostgreSQL tests are enabled via environment variable
pub fn is_db_enabled() -> bool {
    is_test_enabled("ENABLE_DB_TESTS")
}

/// Check if S3 tests are enabled via environment variable
pub fn is_s3_enabled() -> bool {
    is_test_enabled("ENABLE_S3_TESTS")
}

/// Load test configuration from config.toml
pub fn load_test_config() -> Result<Config, anyhow::Error> {
    let config_path = "config.toml";

    load_config(config_path).map_err(|e| anyhow::anyhow!("Failed to load config.toml: {}", e))
}

/// Lifecycle settings with millisecond backoff so retry tests stay fast
pub fn fast_lifecycle_config() -> LifecycleConfig {
    LifecycleConfig {
        base_delay_ms: 1,
        jitter: 0.0,
        ..LifecycleConfig::default()
    }
}

/// Creates a NewArtifactRecord whose key follows the versioned ".pth" layout
///
/// # Arguments
///
/// * `model_name` - The artifact name
/// * `version` - Optional version token; unversioned records use `{name}.pth`
pub fn create_test_record(model_name: &str, version: Option<&str>) -> NewArtifactRecord {
    let storage_key = match version {
        Some(v) => format!("{}/{}.pth", model_name, v),
        None => format!("{}.pth", model_name),
    };
    NewArtifactRecord {
        model_name: model_name.to_string(),
        version: version.map(str::to_string),
        storage_key,
        file_size_bytes: 16,
    }
}
