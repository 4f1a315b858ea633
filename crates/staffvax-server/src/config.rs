// ABOUTME: Configuration loading and validation for the staffvax HTTP server.
// ABOUTME: Reads the listening port, CORS origin and database settings from the environment.

use axum::http::HeaderValue;
use staffvax_store::DatabaseConfig;
use thiserror::Error;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PORT is not a valid port number: {0}")]
    InvalidPort(String),

    #[error("FRONTEND_URL is not a valid origin: {0}")]
    InvalidOrigin(String),

    #[error(transparent)]
    Database(#[from] staffvax_store::ConfigError),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub frontend_origin: HeaderValue,
    pub database: DatabaseConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - PORT: listening port on all interfaces (default: 3001)
    /// - FRONTEND_URL: the single origin allowed by CORS (default: http://localhost:3000)
    /// - plus the database variables read by `DatabaseConfig`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT").filter(|p| !p.is_empty()) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        let frontend_url = lookup("FRONTEND_URL")
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());
        let frontend_origin = HeaderValue::from_str(frontend_url.trim_end_matches('/'))
            .map_err(|_| ConfigError::InvalidOrigin(frontend_url.clone()))?;

        let database = DatabaseConfig::from_lookup(&lookup)?;

        Ok(Self {
            port,
            frontend_origin,
            database,
        })
    }
}
