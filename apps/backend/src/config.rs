//! Runtime configuration read from the environment

use std::time::Duration;

use anyhow::{anyhow, Result};

/// Server and store settings
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL. Without it the server keeps aggregates in memory.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub lock_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset and empty values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let jwt_secret =
            var("JWT_SECRET").ok_or_else(|| anyhow!("JWT_SECRET must be set"))?;

        Ok(Self {
            database_url: var("DATABASE_URL"),
            jwt_secret,
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", var("PORT"), 3000)?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", var("DB_MAX_CONNECTIONS"), 10)?,
            db_acquire_timeout: Duration::from_secs(parse_or(
                "DB_ACQUIRE_TIMEOUT_SECS",
                var("DB_ACQUIRE_TIMEOUT_SECS"),
                5,
            )?),
            lock_timeout: Duration::from_millis(parse_or(
                "LOCK_TIMEOUT_MS",
                var("LOCK_TIMEOUT_MS"),
                5000,
            )?),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("{} has an invalid value '{}'", name, raw)),
        None => Ok(default),
    }
}
