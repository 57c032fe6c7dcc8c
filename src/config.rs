//! Configuration module
//!
//! TOML file at `$BOOKING_CONFIG`, or
//! `<config dir>/station-booking/config.toml`. Every section and field has
//! a default, so a missing file or a partial file is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::application::{BookingSettings, SweeperConfig};
use crate::infrastructure::DatabaseConfig;
use crate::shared::errors::InfraError;
use crate::shared::retry::RetryConfig;

pub const CONFIG_ENV: &str = "BOOKING_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSection,
    pub logging: LoggingConfig,
    pub booking: BookingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds to wait for in-flight requests on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        let db = DatabaseConfig::default();
        Self {
            backend: StorageBackend::Sqlite,
            url: db.url,
            max_connections: db.max_connections,
        }
    }
}

impl DatabaseSection {
    pub fn connection(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of the human-readable format
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub sweep_interval_secs: u64,
    pub admission_hold_ttl_secs: i64,
    /// Attempts of `create_reservation`, including the first
    pub conflict_retry_attempts: u32,
    pub retry_initial_delay_ms: u64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            admission_hold_ttl_secs: 15,
            conflict_retry_attempts: 2,
            retry_initial_delay_ms: 50,
        }
    }
}

impl BookingConfig {
    pub fn settings(&self) -> BookingSettings {
        BookingSettings {
            hold_ttl: chrono::Duration::seconds(self.admission_hold_ttl_secs),
            retry: RetryConfig {
                max_attempts: self.conflict_retry_attempts,
                initial_delay: std::time::Duration::from_millis(self.retry_initial_delay_ms),
                ..RetryConfig::default()
            },
        }
    }

    pub fn sweeper(&self) -> SweeperConfig {
        SweeperConfig {
            interval_secs: self.sweep_interval_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/metrics`
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AppConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, InfraError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, InfraError> {
        let config: Self = toml::from_str(raw).map_err(|e| InfraError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        if self.booking.sweep_interval_secs == 0 {
            return Err(InfraError::Config(
                "booking.sweep_interval_secs must be positive".into(),
            ));
        }
        if self.booking.admission_hold_ttl_secs <= 0 {
            return Err(InfraError::Config(
                "booking.admission_hold_ttl_secs must be positive".into(),
            ));
        }
        if self.booking.conflict_retry_attempts == 0 {
            return Err(InfraError::Config(
                "booking.conflict_retry_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// `$BOOKING_CONFIG` if set, else the per-user config directory.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("station-booking")
        .join("config.toml")
}
