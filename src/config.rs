//! Environment-driven configuration for the command-line tools.
//!
//! The HTTP server takes its pool settings from Rocket's figment
//! (`Rocket.toml` / `ROCKET_DATABASES`); everything else reads plain
//! environment variables through the helpers below.

use rocket_db_pools::sqlx::PgPool;
use rocket_db_pools::sqlx::postgres::PgPoolOptions;
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("database connection failed: {0}")]
    Connect(#[from] rocket_db_pools::sqlx::Error),
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn env_duration_millis(key: &str, default_millis: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(default_millis))
}

/// Connection settings for tools that talk to Postgres outside of Rocket.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            url,
            max_connections: env_u32("DATABASE_MAX_CONNECTIONS", 5),
            acquire_timeout: env_duration_millis("DATABASE_ACQUIRE_TIMEOUT_MS", 30_000),
        })
    }

    pub async fn connect(&self) -> Result<PgPool, ConfigError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.url)
            .await?;

        Ok(pool)
    }
}
