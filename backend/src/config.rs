//! Configuration management for the Food Back-Office Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with BACKOFFICE__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// NOTIFY channel the table triggers in `migrations/0001_initial.sql` publish on
pub const CHANGE_CHANNEL: &str = "backoffice_changes";

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Receipt storage configuration
    pub storage: StorageConfig,

    /// Change feed configuration
    pub realtime: RealtimeConfig,

    /// Log output configuration
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory of the receipts bucket
    pub receipts_dir: String,

    /// Largest accepted receipt upload in bytes
    pub max_receipt_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeConfig {
    /// Postgres NOTIFY channel the table triggers publish on
    pub channel: String,

    /// Capacity of the in-process broadcast buffer
    pub buffer: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// `pretty` or `json`
    pub format: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("BACKOFFICE__ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("storage.receipts_dir", "storage/receipts")?
            .set_default("storage.max_receipt_bytes", 5 * 1024 * 1024)?
            .set_default("realtime.channel", CHANGE_CHANNEL)?
            .set_default("realtime.buffer", 256)?
            .set_default("log.format", "pretty")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (BACKOFFICE__ prefix)
            .add_source(
                Environment::with_prefix("BACKOFFICE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.realtime.validate()?;
        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl RealtimeConfig {
    /// Triggers publish on [`CHANGE_CHANNEL`] only
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel != CHANGE_CHANNEL {
            return Err(ConfigError::Message(format!(
                "realtime.channel must be \"{}\" (got \"{}\")",
                CHANGE_CHANNEL, self.channel
            )));
        }
        if self.buffer == 0 {
            return Err(ConfigError::Message(
                "realtime.buffer must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
