//! # Warden Configuration
//!
//! Settings for the database layer and the binaries built on it.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     WARDEN_DB_PATH=/var/lib/warden/warden.db                           │
//! │     WARDEN_DB_MAX_CONNECTIONS=8                                        │
//! │     WARDEN_LOG=warden_db=debug                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/warden/warden.toml (Linux)                               │
//! │     ~/Library/Application Support/dev.warden.warden/warden.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "warden.db"
//! max_connections = 5
//! min_connections = 1
//! connect_timeout_secs = 30
//! run_migrations = true
//!
//! [logging]
//! filter = "info,warden_db=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pool::DbConfig;

// =============================================================================
// Errors
// =============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read or written.
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for [`WardenConfig`].
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be serialized.
    #[error("Failed to save config: {0}")]
    Save(#[from] toml::ser::Error),

    /// Values parsed but don't make sense together.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Database Settings
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite file. `:memory:` is accepted for throwaway runs.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Apply embedded migrations on connect.
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("warden.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive. `RUST_LOG` still wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Warden configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl WardenConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, else the platform config dir)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::Invalid("no config directory available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, toml::to_string_pretty(self)?)?;

        info!(?path, "Config saved");
        Ok(path)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let db = &self.database;

        if db.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if db.min_connections > db.max_connections {
            return Err(ConfigError::Invalid(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                db.min_connections, db.max_connections
            )));
        }

        if db.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        Ok(())
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// [`WardenConfig::load`]).
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("WARDEN_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = var("WARDEN_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(max) => self.database.max_connections = max,
                Err(_) => warn!(value = %max, "Ignoring non-numeric WARDEN_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(filter) = var("WARDEN_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "warden", "warden")
            .map(|dirs| dirs.config_dir().join("warden.toml"))
    }

    /// Builds the pool configuration.
    pub fn db_config(&self) -> DbConfig {
        if self.database.path.as_os_str() == ":memory:" {
            return DbConfig::in_memory().run_migrations(self.database.run_migrations);
        }

        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .run_migrations(self.database.run_migrations)
    }
}
