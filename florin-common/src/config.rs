//! Configuration loading for Florin services
//!
//! Resolution priority per setting: environment variable → TOML config file
//! → built-in default. Environment variables use the `FLORIN_` prefix.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// On-disk TOML configuration
///
/// All fields optional; unset fields fall back to env or defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Socket address the HTTP server binds to
    pub listen_addr: Option<String>,
    /// SQLite database file path
    pub database_path: Option<String>,
    /// Bearer token accepted on the progress socket
    pub api_token: Option<String>,
    /// Job record retention in seconds
    pub job_ttl_seconds: Option<u64>,
    /// Log filter directive (e.g. "info", "florin_import=debug")
    pub log_filter: Option<String>,
}

impl TomlConfig {
    /// Read and parse a TOML config file
    ///
    /// A missing file is not an error; it resolves to the empty config so
    /// env/defaults take over.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read config failed: {}", e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Parse config failed: {}", e)))
    }
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen_addr: String,
    pub database_path: String,
    pub api_token: String,
    pub job_ttl_seconds: u64,
    pub log_filter: String,
}

impl ServiceConfig {
    /// Resolve configuration from environment and TOML
    pub fn resolve(toml: &TomlConfig) -> Self {
        let listen_addr = resolve_setting("FLORIN_LISTEN_ADDR", &toml.listen_addr)
            .unwrap_or_else(|| "127.0.0.1:4445".to_string());
        let database_path = resolve_setting("FLORIN_DATABASE_PATH", &toml.database_path)
            .unwrap_or_else(|| "florin.db".to_string());
        let api_token = resolve_setting("FLORIN_API_TOKEN", &toml.api_token).unwrap_or_default();
        let job_ttl_seconds = resolve_setting(
            "FLORIN_JOB_TTL_SECONDS",
            &toml.job_ttl_seconds.map(|v| v.to_string()),
        )
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600);
        let log_filter = resolve_setting("FLORIN_LOG_FILTER", &toml.log_filter)
            .unwrap_or_else(|| "info".to_string());

        Self {
            listen_addr,
            database_path,
            api_token,
            job_ttl_seconds,
            log_filter,
        }
    }
}

/// Single-setting resolution: ENV wins over TOML
fn resolve_setting(env_key: &str, toml_value: &Option<String>) -> Option<String> {
    if let Ok(value) = std::env::var(env_key) {
        if !value.trim().is_empty() {
            return Some(value);
        }
    }
    toml_value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_resolves_to_defaults() {
        let toml = TomlConfig::load(Path::new("/nonexistent/florin.toml")).unwrap();
        let config = ServiceConfig::resolve(&toml);
        assert_eq!(config.listen_addr, "127.0.0.1:4445");
        assert_eq!(config.job_ttl_seconds, 3600);
    }

    #[test]
    fn toml_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("florin.toml");
        std::fs::write(
            &path,
            r#"
listen_addr = "0.0.0.0:9000"
job_ttl_seconds = 120
"#,
        )
        .unwrap();

        let toml = TomlConfig::load(&path).unwrap();
        let config = ServiceConfig::resolve(&toml);
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.job_ttl_seconds, 120);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("florin.toml");
        std::fs::write(&path, "listen_addr = [not toml").unwrap();

        let err = TomlConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
