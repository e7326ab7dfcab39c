//! Application configuration module
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `FIELDSYNC_*` environment variables. Every layer goes through
//! [`AppConfigBuilder`] so validation happens in one place.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Consecutive item failures that abort a drain pass
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

const DEFAULT_HEALTH_PATH: &str = "/api/health";
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Base URL of the remote API
    pub server_url: String,
    /// SQLite file for the local store; `None` uses the platform data dir
    pub database_path: Option<PathBuf>,
    /// Bearer token sent with every remote call
    pub api_token: Option<String>,
    /// Circuit breaker threshold for a drain pass
    pub max_consecutive_failures: u32,
    /// Per-request timeout; `None` leaves the client default
    pub request_timeout: Option<Duration>,
    /// Path probed by the network monitor
    pub health_path: String,
    /// How long shutdown waits for a running pass
    pub shutdown_grace: Duration,
    /// Compress photos before queueing
    pub compress_photos: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            database_path: None,
            api_token: None,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            request_timeout: None,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            compress_photos: true,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Defaults, then the TOML file (if given), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = AppConfig::builder();
        if let Some(path) = path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
            builder = builder.merge_toml(&contents)?;
        }
        builder.merge_env()?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.server_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.server_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                self.server_url
            )));
        }
        if self.max_consecutive_failures == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_consecutive_failures",
                value: "0".to_string(),
            });
        }
        if !self.health_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                key: "health_path",
                value: self.health_path.clone(),
            });
        }
        Ok(())
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }

    /// Resolved SQLite file location
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(default_database_path)
    }
}

/// Platform data directory, falling back to the temp dir
pub fn default_database_path() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
    path.push("fieldsync");
    path.push("local.db");
    path
}

/// On-disk representation, every key optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server_url: Option<String>,
    database_path: Option<PathBuf>,
    api_token: Option<String>,
    max_consecutive_failures: Option<u32>,
    request_timeout_secs: Option<u64>,
    health_path: Option<String>,
    shutdown_grace_secs: Option<u64>,
    compress_photos: Option<bool>,
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = url.into();
        self
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = Some(path.into());
        self
    }

    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.config.api_token = Some(token.into());
        self
    }

    pub fn max_consecutive_failures(mut self, limit: u32) -> Self {
        self.config.max_consecutive_failures = limit;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    pub fn compress_photos(mut self, enabled: bool) -> Self {
        self.config.compress_photos = enabled;
        self
    }

    /// Apply values from a TOML document
    pub fn merge_toml(mut self, contents: &str) -> Result<Self, ConfigError> {
        let file: FileConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if let Some(url) = file.server_url {
            self.config.server_url = url;
        }
        if let Some(path) = file.database_path {
            self.config.database_path = Some(path);
        }
        if let Some(token) = file.api_token {
            self.config.api_token = Some(token);
        }
        if let Some(limit) = file.max_consecutive_failures {
            self.config.max_consecutive_failures = limit;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.config.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(path) = file.health_path {
            self.config.health_path = path;
        }
        if let Some(secs) = file.shutdown_grace_secs {
            self.config.shutdown_grace = Duration::from_secs(secs);
        }
        if let Some(enabled) = file.compress_photos {
            self.config.compress_photos = enabled;
        }
        Ok(self)
    }

    /// Apply `FIELDSYNC_*` environment variables
    pub fn merge_env(self) -> Result<Self, ConfigError> {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    fn merge_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(url) = var("FIELDSYNC_SERVER_URL") {
            self.config.server_url = url;
        }
        if let Some(path) = var("FIELDSYNC_DB_PATH") {
            self.config.database_path = Some(PathBuf::from(path));
        }
        if let Some(token) = var("FIELDSYNC_API_TOKEN") {
            self.config.api_token = Some(token);
        }
        if let Some(value) = var("FIELDSYNC_MAX_CONSECUTIVE_FAILURES") {
            self.config.max_consecutive_failures =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "FIELDSYNC_MAX_CONSECUTIVE_FAILURES",
                    value,
                })?;
        }
        if let Some(value) = var("FIELDSYNC_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "FIELDSYNC_REQUEST_TIMEOUT_SECS",
                value,
            })?;
            self.config.request_timeout = Some(Duration::from_secs(secs));
        }
        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("failed to read config: {0}")]
    Io(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
}
