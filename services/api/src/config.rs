//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which `EntityStore` implementation backs the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::InvalidValue(
                "STORE_BACKEND".to_string(),
                format!("'{}' is not one of postgres, memory", other),
            )),
        }
    }
}

/// The selected store backend together with what it needs to start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreConfig {
    Postgres { database_url: String },
    Memory,
}

impl StoreConfig {
    /// Pairs the backend with its connection URL. Postgres without a URL is an error.
    pub fn new(backend: StoreBackend, database_url: Option<String>) -> Result<Self, ConfigError> {
        match backend {
            StoreBackend::Postgres => database_url
                .map(|database_url| StoreConfig::Postgres { database_url })
                .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string())),
            StoreBackend::Memory => Ok(StoreConfig::Memory),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub store: StoreConfig,
    pub database_max_connections: u32,
    pub log_level: Level,
    pub front_origins: Vec<String>,
    pub store_call_timeout: Duration,
    pub session_dedup_ttl: Duration,
    pub session_ttl_days: i64,
    pub admin_email: Option<String>,
}

impl Default for Config {
    /// The values `from_env` falls back to, with the in-memory backend.
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            store: StoreConfig::Memory,
            database_max_connections: 5,
            log_level: Level::INFO,
            front_origins: vec!["http://localhost:5173".to_string()],
            store_call_timeout: Duration::from_millis(5000),
            session_dedup_ttl: Duration::from_millis(5000),
            session_ttl_days: 30,
            admin_email: None,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Store Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let store_backend = std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse::<StoreBackend>()?;

        let store = StoreConfig::new(store_backend, std::env::var("DATABASE_URL").ok())?;
        let database_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", 5u32)?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load HTTP Settings ---
        let front_origins: Vec<String> = std::env::var("FRONT_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        // --- Load Timeouts and Session Settings ---
        let store_call_timeout = Duration::from_millis(parse_var("STORE_CALL_TIMEOUT_MS", 5000u64)?);
        let session_dedup_ttl = Duration::from_millis(parse_var("SESSION_DEDUP_TTL_MS", 5000u64)?);
        let session_ttl_days = parse_var("SESSION_TTL_DAYS", 30i64)?;
        if session_ttl_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_DAYS".to_string(),
                "must be positive".to_string(),
            ));
        }

        let admin_email = std::env::var("ADMIN_EMAIL")
            .ok()
            .filter(|e| !e.trim().is_empty());

        Ok(Self {
            bind_address,
            store,
            database_max_connections,
            log_level,
            front_origins,
            store_call_timeout,
            session_dedup_ttl,
            session_ttl_days,
            admin_email,
        })
    }
}

/// Reads an optional numeric variable, falling back to `default` when it is unset.
fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
