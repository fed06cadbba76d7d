//! Environment-based settings shared by the server and the admin tool.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use atelier_db::path::DEFAULT_DATA_ROOT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    /// Top-level key of the current data generation, e.g. `v0_1_0`.
    pub data_root: String,
    pub storage_dir: PathBuf,
    pub export_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub push_endpoint: Option<String>,
    pub push_api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("atelier.db"),
            data_root: DEFAULT_DATA_ROOT.to_string(),
            storage_dir: PathBuf::from("./storage"),
            export_dir: PathBuf::from("./export"),
            host: "0.0.0.0".to_string(),
            port: 3000,
            push_endpoint: None,
            push_api_key: None,
        }
    }
}

impl Settings {
    /// Reads `ATELIER_*` variables on top of the defaults. Call
    /// `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Ok(path) = env::var("ATELIER_DB_PATH") {
            settings.db_path = PathBuf::from(path);
        }
        if let Ok(root) = env::var("ATELIER_DATA_ROOT") {
            if root.is_empty() || root.contains('/') {
                return Err(ConfigError::InvalidValue(format!("Invalid data root: {:?}", root)));
            }
            settings.data_root = root;
        }
        if let Ok(dir) = env::var("ATELIER_STORAGE_DIR") {
            settings.storage_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("ATELIER_EXPORT_DIR") {
            settings.export_dir = PathBuf::from(dir);
        }
        if let Ok(host) = env::var("ATELIER_HOST") {
            settings.host = host;
        }
        if let Ok(port) = env::var("ATELIER_PORT") {
            settings.port = port
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid port: {}", e)))?;
        }
        settings.push_endpoint = env::var("ATELIER_PUSH_ENDPOINT").ok().filter(|v| !v.is_empty());
        settings.push_api_key = env::var("ATELIER_PUSH_API_KEY").ok().filter(|v| !v.is_empty());

        Ok(settings)
    }

    pub fn require_push_endpoint(&self) -> Result<&str, ConfigError> {
        self.push_endpoint
            .as_deref()
            .ok_or(ConfigError::Missing("ATELIER_PUSH_ENDPOINT"))
    }
}
