//! Configuration management module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::models::MarkParameters;
use crate::scancard::{DEFAULT_HOST, DEFAULT_PORT, RECV_BUFFER_SIZE};

/// Configuration load result.
#[derive(Debug)]
pub enum ConfigLoadResult {
    /// Config loaded successfully.
    Loaded(AppConfig),
    /// Config file missing (first run).
    Missing,
    /// Config file exists but invalid.
    Invalid(ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scancard: ScancardConfig,
    #[serde(default)]
    pub parameters: MarkParameters,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scancard socket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScancardConfig {
    pub host: String,
    /// TCP port of the scancard JSON service (default: 50000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Response timeout in seconds (default: 5).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Size of the single response read (default: 1024).
    #[serde(default = "default_recv_buffer_bytes")]
    pub recv_buffer_bytes: usize,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_recv_buffer_bytes() -> usize {
    RECV_BUFFER_SIZE
}

/// Layer automation timing and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Wait between open/set/download/start steps.
    pub settle_delay_ms: u64,
    /// Wait between working status polls.
    pub poll_interval_ms: u64,
    /// Status polls allowed per layer before giving up.
    pub max_poll_attempts: u32,
    /// Optional wall-clock bound on polling for one layer.
    pub max_poll_secs: Option<u64>,
    /// Parameter layer written by `set_markparameters_by_layer`.
    pub parameter_layer: i32,
    /// Send `stop_mark` when a layer fails after marking started.
    pub stop_on_failure: bool,
}

/// Job file discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Substring a file name must contain to count as a layer job file.
    pub marker: String,
    /// Directory scanned by `run` when none is given on the command line.
    pub directory: Option<PathBuf>,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    /// Defaults to the platform data directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl AppConfig {
    /// Get config file path (same directory as executable).
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Attempt to load config with detailed result.
    pub fn try_load(path: &Path) -> ConfigLoadResult {
        if !path.exists() {
            return ConfigLoadResult::Missing;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<AppConfig>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => ConfigLoadResult::Loaded(config),
                    Err(e) => ConfigLoadResult::Invalid(e),
                },
                Err(e) => ConfigLoadResult::Invalid(ConfigError::Parse(e)),
            },
            Err(e) => ConfigLoadResult::Invalid(ConfigError::Read(e)),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scancard.host.trim().is_empty() {
            return Err(ConfigError::Validation("Scancard host cannot be empty".to_string()));
        }
        if self.scancard.port == 0 {
            return Err(ConfigError::Validation(
                "Scancard port must be greater than 0".to_string(),
            ));
        }
        if self.scancard.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Scancard timeout must be at least 1 second".to_string(),
            ));
        }
        if self.scancard.recv_buffer_bytes == 0 {
            return Err(ConfigError::Validation(
                "Receive buffer must be greater than 0 bytes".to_string(),
            ));
        }
        if self.automation.max_poll_attempts == 0 {
            return Err(ConfigError::Validation(
                "Max poll attempts must be at least 1".to_string(),
            ));
        }
        if self.automation.max_poll_secs == Some(0) {
            return Err(ConfigError::Validation(
                "Poll deadline must be at least 1 second".to_string(),
            ));
        }
        if self.job.marker.trim().is_empty() {
            return Err(ConfigError::Validation("Job file marker cannot be empty".to_string()));
        }
        if let Some(field) = self.parameters.invalid_field() {
            return Err(ConfigError::Validation(format!(
                "Mark parameter {field} must be a finite, non-negative number"
            )));
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl ScancardConfig {
    /// Socket address in `host:port` form.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AutomationConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_deadline(&self) -> Option<Duration> {
        self.max_poll_secs.map(Duration::from_secs)
    }
}

impl Default for ScancardConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            recv_buffer_bytes: default_recv_buffer_bytes(),
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1000,
            poll_interval_ms: 1000,
            max_poll_attempts: 600,
            max_poll_secs: None,
            parameter_layer: 0,
            stop_on_failure: true,
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            marker: "emd".to_string(),
            directory: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: true,
            directory: None,
            file_prefix: "scancard.log".to_string(),
        }
    }
}
