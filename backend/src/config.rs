//! Configuration management for the weather scraper
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with SCRAPER_ prefix
//! 4. Conventional variables: TOMORROW_API_KEY, DATABASE_URL and the libpq
//!    PGHOST/PGPORT/PGUSER/PGPASSWORD/PGDATABASE set

use config::{builder::DefaultState, ConfigBuilder, Environment, File};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use std::{fmt, str::FromStr, time::Duration};

use crate::error::{AppError, AppResult};
use crate::external::tomorrow::DEFAULT_BASE_URL;
use crate::storage::OverwritePolicy;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Tomorrow.io API configuration
    pub tomorrow: TomorrowConfig,

    /// Storage engine configuration
    pub storage: StorageConfig,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL, takes precedence over the discrete fields
    pub url: Option<String>,

    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,

    /// Apply embedded migrations on startup
    pub run_migrations: bool,
}

#[derive(Deserialize, Clone)]
pub struct TomorrowConfig {
    /// Tomorrow.io API key
    pub api_key: String,

    /// API base URL
    pub base_url: String,

    /// Minimum spacing between two requests, in milliseconds
    pub request_interval_ms: u64,

    /// Timestep granularity requested from the provider
    pub timesteps: String,

    /// HTTP request timeout, in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Whether forecast writes may replace stored history rows
    pub overwrite_policy: OverwritePolicy,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> AppResult<Self> {
        let environment =
            std::env::var("SCRAPER_ENVIRONMENT").unwrap_or_else(|_| "production".into());

        let builder = Self::with_defaults(&environment)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (SCRAPER_ prefix)
            .add_source(
                Environment::with_prefix("SCRAPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("tomorrow.api_key", env_var("TOMORROW_API_KEY"))?
            .set_override_option("database.url", env_var("DATABASE_URL"))?
            .set_override_option("database.host", env_var("PGHOST"))?
            .set_override_option("database.port", env_var("PGPORT"))?
            .set_override_option("database.user", env_var("PGUSER"))?
            .set_override_option("database.password", env_var("PGPASSWORD"))?
            .set_override_option("database.dbname", env_var("PGDATABASE"))?;

        Self::finish(builder)
    }

    /// Builder pre-populated with the in-code defaults
    fn with_defaults(environment: &str) -> AppResult<ConfigBuilder<DefaultState>> {
        let builder = config::Config::builder()
            .set_default("environment", environment)?
            .set_default("database.max_connections", 5)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.run_migrations", false)?
            .set_default("tomorrow.api_key", "")?
            .set_default("tomorrow.base_url", DEFAULT_BASE_URL)?
            .set_default("tomorrow.request_interval_ms", 500)?
            .set_default("tomorrow.timesteps", "hourly")?
            .set_default("tomorrow.timeout_secs", 30)?
            .set_default("storage.overwrite_policy", "replace")?;

        Ok(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> AppResult<Self> {
        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot run a scrape
    pub fn validate(&self) -> AppResult<()> {
        if self.tomorrow.api_key.trim().is_empty() {
            return Err(AppError::Configuration(
                "TOMORROW_API_KEY environment variable is not set".to_string(),
            ));
        }
        if self.tomorrow.timeout_secs == 0 {
            return Err(AppError::Configuration(
                "tomorrow.timeout_secs must be greater than zero".to_string(),
            ));
        }
        self.database.validate()
    }
}

impl DatabaseConfig {
    fn validate(&self) -> AppResult<()> {
        if self.url.is_some() {
            return Ok(());
        }

        let missing: Vec<&str> = [
            ("PGHOST", self.host.is_none()),
            ("PGPORT", self.port.is_none()),
            ("PGUSER", self.user.is_none()),
            ("PGPASSWORD", self.password.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, is_missing)| is_missing.then_some(name))
        .collect();

        if !missing.is_empty() {
            return Err(AppError::Configuration(format!(
                "Postgres environment variables not set: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// Connection options for the pool
    pub fn connect_options(&self) -> AppResult<PgConnectOptions> {
        if let Some(url) = &self.url {
            return Ok(PgConnectOptions::from_str(url)?);
        }

        self.validate()?;
        let mut options = PgConnectOptions::new();
        if let Some(host) = &self.host {
            options = options.host(host);
        }
        if let Some(port) = self.port {
            options = options.port(port);
        }
        if let Some(user) = &self.user {
            options = options.username(user);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        if let Some(dbname) = &self.dbname {
            options = options.database(dbname);
        }
        Ok(options)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl TomorrowConfig {
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Credentials stay out of debug output.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("dbname", &self.dbname)
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("run_migrations", &self.run_migrations)
            .finish()
    }
}

impl fmt::Debug for TomorrowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TomorrowConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("request_interval_ms", &self.request_interval_ms)
            .field("timesteps", &self.timesteps)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
