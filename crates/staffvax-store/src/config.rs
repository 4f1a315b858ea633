// ABOUTME: Database configuration loaded from environment variables.
// ABOUTME: Decides between the embedded and hosted backend and opens the selected store once.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;

use crate::error::StoreError;
use crate::postgres::PostgresStore;
use crate::sqlite::SqliteStore;
use crate::store::StaffStore;

const DEFAULT_SQLITE_PATH: &str = "data/staff.db";
const DEFAULT_PG_PORT: u16 = 5432;
const DEFAULT_POOL_MAX: u32 = 10;
const POOL_TIMEOUT: Duration = Duration::from_secs(20);

/// Errors that can occur while reading database configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not a valid number: {value}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("PGSSLMODE is not a recognised ssl mode: {0}")]
    InvalidSslMode(String),
}

/// Runtime mode. Production uses the hosted store, everything else the embedded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("production") => Mode::Production,
            _ => Mode::Development,
        }
    }
}

/// Connection parameters for the hosted PostgreSQL store.
#[derive(Clone)]
pub struct HostedConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// `require` (the default) encrypts without verifying the server certificate.
    pub ssl_mode: PgSslMode,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl HostedConfig {
    /// Options for one connection to the hosted database.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(self.ssl_mode)
    }
}

impl fmt::Debug for HostedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostedConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

/// Everything needed to open either store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub mode: Mode,
    pub sqlite_path: PathBuf,
    pub hosted: HostedConfig,
}

impl DatabaseConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - APP_ENV: `production` selects PostgreSQL (default: development, SQLite)
    /// - NODE_ENV: read when APP_ENV is unset
    /// - SQLITE_PATH: embedded database file (default: data/staff.db)
    /// - PGHOST, PGUSER, PGPASSWORD, PGDATABASE: hosted connection parameters
    /// - PGPORT: hosted port (default: 5432)
    /// - PGSSLMODE: disable | allow | prefer | require | verify-ca | verify-full (default: require)
    /// - PG_POOL_MAX: maximum pooled connections (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let mode = Mode::from_value(var("APP_ENV").or_else(|| var("NODE_ENV")).as_deref());
        let sqlite_path = var("SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SQLITE_PATH));

        let port = parse_number("PGPORT", var("PGPORT"), DEFAULT_PG_PORT)?;
        let max_connections = parse_number("PG_POOL_MAX", var("PG_POOL_MAX"), DEFAULT_POOL_MAX)?;

        let ssl_mode = match var("PGSSLMODE") {
            Some(raw) => raw
                .parse::<PgSslMode>()
                .map_err(|_| ConfigError::InvalidSslMode(raw))?,
            None => PgSslMode::Require,
        };

        let hosted = HostedConfig {
            host: var("PGHOST").unwrap_or_else(|| "localhost".to_string()),
            port,
            user: var("PGUSER").unwrap_or_else(|| "postgres".to_string()),
            password: var("PGPASSWORD").unwrap_or_default(),
            database: var("PGDATABASE").unwrap_or_else(|| "postgres".to_string()),
            ssl_mode,
            max_connections,
            connect_timeout: POOL_TIMEOUT,
            idle_timeout: POOL_TIMEOUT,
        };

        Ok(Self {
            mode,
            sqlite_path,
            hosted,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        None => Ok(default),
    }
}

/// Open the embedded store at the configured path.
pub fn open_embedded(config: &DatabaseConfig) -> Result<Arc<dyn StaffStore>, StoreError> {
    Ok(Arc::new(SqliteStore::open(&config.sqlite_path)?))
}

/// Connect to the hosted store.
pub async fn open_hosted(config: &DatabaseConfig) -> Result<Arc<dyn StaffStore>, StoreError> {
    Ok(Arc::new(PostgresStore::connect(&config.hosted).await?))
}

/// Open the store selected by the runtime mode. Called once per process; the
/// result is injected wherever persistence is needed.
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn StaffStore>, StoreError> {
    let store = match config.mode {
        Mode::Development => open_embedded(config)?,
        Mode::Production => open_hosted(config).await?,
    };
    tracing::info!(backend = store.backend(), "storage backend selected");
    Ok(store)
}
