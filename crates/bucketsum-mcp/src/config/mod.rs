//! Configuration loading and resolution.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{McpError, McpResult};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "BUCKETSUM_CONFIG";

const CWD_CONFIG: &str = "bucketsum/config.json";

/// Store location and target collection. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub mongo_host: String,
    pub mongo_port: u16,
    pub database_name: String,
    pub collection_name: String,
    pub connect_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mongo_host: "localhost".to_string(),
            mongo_port: 27017,
            database_name: "db".to_string(),
            collection_name: "sample_collection".to_string(),
            connect_timeout_ms: 5000,
        }
    }
}

impl ServerConfig {
    /// Parse a JSON config file. Absent fields take their defaults.
    pub fn from_file(path: &Path) -> McpResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            McpError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config {}: {e}", path.display()),
            ))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load from `path` if given, falling back to defaults on any failure.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::debug!("No config file found, using defaults");
            return Self::default();
        };

        match Self::from_file(path) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Ignoring config {}: {e}. Using defaults.", path.display());
                Self::default()
            }
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database_name, self.collection_name)
    }
}

/// Resolve the config file: explicit flag, then `$BUCKETSUM_CONFIG`, then
/// `./bucketsum/config.json` if it exists.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let cwd_config = PathBuf::from(CWD_CONFIG);
    cwd_config.exists().then_some(cwd_config)
}
