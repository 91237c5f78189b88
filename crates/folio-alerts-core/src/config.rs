//! Configuration management for Folio Alerts
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables such as `FOLIO_ALERTS__SERVER__HTTP_PORT=9090`.

use std::time::Duration;

use ::config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::Result;

const ENV_PREFIX: &str = "FOLIO_ALERTS";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Alert sweep configuration
    pub alerting: AlertingConfig,

    /// Live metrics source
    pub metrics: MetricsConfig,

    /// Notification delivery
    pub delivery: DeliveryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        Self::load_with(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with(path: Option<&str>, env: Environment) -> Result<Self> {
        let mut builder = ::config::Config::builder()
            .add_source(::config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::new(path, FileFormat::Toml).required(true));
        }

        let settings = builder
            .add_source(
                env.prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// HTTP API port
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Maximum connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://folio-alerts.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Alert sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// Run the periodic sweep when `serve` starts
    pub sweep_enabled: bool,
    /// Time between sweeps
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Alerts evaluated concurrently within a sweep
    pub sweep_concurrency: usize,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            sweep_enabled: true,
            sweep_interval: Duration::from_secs(60),
            sweep_concurrency: 8,
        }
    }
}

/// Live metrics source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Base URL of the metrics service; the sweep is disabled when unset
    pub base_url: Option<String>,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Notification delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Webhook receiving notifications; dispatch is disabled when unset
    pub webhook_url: Option<String>,
    /// Time between dispatch passes
    #[serde(with = "humantime_serde")]
    pub dispatch_interval: Duration,
    /// Pending notifications sent per pass
    pub batch_size: i64,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            dispatch_interval: Duration::from_secs(10),
            batch_size: 100,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
