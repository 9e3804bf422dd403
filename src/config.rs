//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::storage::{SnapshotFormat, DEFAULT_NULL_MARKER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Snapshot storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,

    #[serde(default)]
    pub snapshot_format: SnapshotFormat,

    #[serde(default = "default_null_marker")]
    pub csv_null_marker: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("rollcall").to_string_lossy().to_string())
        .unwrap_or_else(|| "./rollcall_data".to_string())
}

fn default_snapshot_file() -> String {
    "roster.snapshot".to_string()
}

fn default_null_marker() -> String {
    DEFAULT_NULL_MARKER.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            snapshot_file: default_snapshot_file(),
            snapshot_format: SnapshotFormat::default(),
            csv_null_marker: default_null_marker(),
        }
    }
}

impl StorageConfig {
    /// Full path of the roster snapshot
    pub fn snapshot_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.snapshot_file)
    }
}

/// Index and statistics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_gpa_min")]
    pub gpa_min: f64,

    #[serde(default = "default_gpa_max")]
    pub gpa_max: f64,

    /// Minimum gpa counted as an honor student
    #[serde(default = "default_honor_threshold")]
    pub honor_threshold: f64,

    /// Number of courses listed as most popular
    #[serde(default = "default_popular_courses")]
    pub popular_courses: usize,
}

fn default_gpa_min() -> f64 {
    0.0
}

fn default_gpa_max() -> f64 {
    4.0
}

fn default_honor_threshold() -> f64 {
    3.5
}

fn default_popular_courses() -> usize {
    5
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            gpa_min: default_gpa_min(),
            gpa_max: default_gpa_max(),
            honor_threshold: default_honor_threshold(),
            popular_courses: default_popular_courses(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        // Try default config locations
        let config_paths = [
            dirs::config_dir().map(|p| p.join("rollcall").join("config.toml")),
            Some(PathBuf::from("./rollcall.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; unparsable values are ignored
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Storage overrides
        if let Some(data_dir) = lookup("ROLLCALL_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }
        if let Some(format) = lookup("ROLLCALL_SNAPSHOT_FORMAT") {
            match format.parse() {
                Ok(f) => self.storage.snapshot_format = f,
                Err(e) => tracing::warn!("Ignoring ROLLCALL_SNAPSHOT_FORMAT: {}", e),
            }
        }

        // Index overrides
        if let Some(threshold) = lookup("ROLLCALL_HONOR_THRESHOLD") {
            if let Ok(t) = threshold.parse() {
                self.index.honor_threshold = t;
            }
        }

        // Logging overrides
        if let Some(level) = lookup("ROLLCALL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("ROLLCALL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Reject settings the roster cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let idx = &self.index;
        if !(idx.gpa_min.is_finite() && idx.gpa_max.is_finite()) || idx.gpa_min > idx.gpa_max {
            return Err(ConfigError::Invalid(format!(
                "gpa bounds [{}, {}] are not a valid range",
                idx.gpa_min, idx.gpa_max
            )));
        }
        if !idx.honor_threshold.is_finite() {
            return Err(ConfigError::Invalid(
                "honor_threshold must be finite".to_string(),
            ));
        }
        if self.storage.snapshot_file.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "snapshot_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    // A subscriber may already be installed (tests, embedding)
    if let Err(e) = result {
        tracing::debug!("Tracing subscriber not installed: {}", e);
    }
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Rollcall Configuration
#
# Environment variables override these settings:
# - ROLLCALL_DATA_DIR
# - ROLLCALL_SNAPSHOT_FORMAT
# - ROLLCALL_HONOR_THRESHOLD
# - ROLLCALL_LOG_LEVEL
# - ROLLCALL_LOG_FORMAT

[storage]
# Directory holding the roster snapshot
data_dir = "~/.local/share/rollcall"

# Snapshot file name inside data_dir
snapshot_file = "roster.snapshot"

# Snapshot encoding: json or binary
snapshot_format = "json"

# Written in CSV exports for absent values
csv_null_marker = "NULL"

[index]
# Valid gpa range (inclusive)
gpa_min = 0.0
gpa_max = 4.0

# Minimum gpa counted as an honor student
honor_threshold = 3.5

# Number of courses listed as most popular
popular_courses = 5

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
