//! Server configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use battwatch_store::{DEFAULT_CAPACITY, DEFAULT_FLUSH_INTERVAL, FlushPolicy};

/// Largest history capacity accepted.
pub const MAX_CAPACITY: usize = 100_000;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Snapshot settings.
    pub storage: StorageConfig,
    /// History buffer and query settings.
    pub history: HistoryConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every problem found.
    ///
    /// This checks:
    /// - Server bind address is `host:port` with a non-zero port
    /// - Snapshot path is not empty
    /// - History capacity is between 1 and [`MAX_CAPACITY`]
    /// - Query limits satisfy `1 <= default_limit <= max_limit`
    ///
    /// # Example
    ///
    /// ```
    /// use battwatch_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.history.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(FieldError::new("server.bind", "bind address cannot be empty"));
            return errors;
        }

        let Some((_, port)) = self.bind.rsplit_once(':') else {
            errors.push(FieldError::new(
                "server.bind",
                format!(
                    "invalid bind address '{}': expected format 'host:port'",
                    self.bind
                ),
            ));
            return errors;
        };

        match port.parse::<u16>() {
            Ok(0) => errors.push(FieldError::new("server.bind", "port cannot be 0")),
            Err(_) => errors.push(FieldError::new(
                "server.bind",
                format!("invalid port '{}': must be a number 1-65535", port),
            )),
            Ok(_) => {}
        }

        errors
    }
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot file path.
    pub snapshot_path: PathBuf,
    /// Appends between snapshot writes. Zero writes only on shutdown.
    pub flush_interval: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: battwatch_store::default_snapshot_path(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if self.snapshot_path.as_os_str().is_empty() {
            errors.push(FieldError::new(
                "storage.snapshot_path",
                "snapshot path cannot be empty",
            ));
        }

        errors
    }

    /// Flush policy derived from `flush_interval`.
    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy::from_interval(self.flush_interval)
    }
}

/// History buffer and `/history` query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of samples kept in memory.
    pub capacity: usize,
    /// Samples returned by `/history` when no limit is given.
    pub default_limit: usize,
    /// Upper bound on the `/history` limit.
    pub max_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_limit: 100,
            max_limit: DEFAULT_CAPACITY,
        }
    }
}

impl HistoryConfig {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if self.capacity == 0 {
            errors.push(FieldError::new("history.capacity", "capacity must be at least 1"));
        } else if self.capacity > MAX_CAPACITY {
            errors.push(FieldError::new(
                "history.capacity",
                format!(
                    "capacity {} is too large (maximum {})",
                    self.capacity, MAX_CAPACITY
                ),
            ));
        }

        if self.default_limit == 0 {
            errors.push(FieldError::new(
                "history.default_limit",
                "default limit must be at least 1",
            ));
        } else if self.default_limit > self.max_limit {
            errors.push(FieldError::new(
                "history.default_limit",
                format!(
                    "default limit {} exceeds max limit {}",
                    self.default_limit, self.max_limit
                ),
            ));
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_field_errors(.0))]
    Validation(Vec<FieldError>),
}

/// A single invalid setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted field path (e.g., `history.capacity`).
    pub field: String,
    /// Description of the problem.
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("battwatch")
        .join("server.toml")
}
