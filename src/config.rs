//! Configuration management for the prediction service

use crate::types::prediction::RiskLevelThresholds;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub risk_levels: RiskLevelThresholds,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Raises the default log level to debug
    pub debug: bool,
}

/// Model artifact configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the serialized classifier (`.json` or `.onnx`)
    pub path: String,
    /// Number of threads for ONNX inference (default: 1)
    pub onnx_threads: usize,
}

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between logged summaries, 0 disables the reporter
    pub report_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path, layered over the defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = Config::builder()
            .add_source(
                Config::try_from(&AppConfig::default())
                    .context("Failed to encode default configuration")?,
            )
            .add_source(File::from(path))
            .build()
            .with_context(|| format!("Failed to build configuration from {}", path.display()))?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Development profile: local listener with debug enabled
    pub fn development() -> Self {
        let mut config = Self::default();
        config.server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 5000,
            debug: true,
        };
        config.logging.format = "pretty".to_string();
        config
    }

    /// Socket address to bind
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid bind address {}:{}",
                    self.server.host, self.server.port
                )
            })
    }

    /// Effective log level. Debug mode raises it to at least `debug`;
    /// a more verbose level or a filter directive is kept as configured.
    pub fn log_level(&self) -> &str {
        if !self.server.debug {
            return &self.logging.level;
        }

        match self.logging.level.parse::<tracing::Level>() {
            Ok(level) if level < tracing::Level::DEBUG => "debug",
            _ => &self.logging.level,
        }
    }
}

/// Production profile: all interfaces, fixed port, debug disabled
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                debug: false,
            },
            model: ModelConfig {
                path: "models/random_forest.json".to_string(),
                onnx_threads: 1,
            },
            risk_levels: RiskLevelThresholds::default(),
            metrics: MetricsConfig {
                report_interval_secs: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}
