//! Error handling for the weather scraper
//!
//! Every fallible operation in the crate returns [`AppResult`]. Errors are
//! never swallowed or retried internally: they propagate to the caller, and a
//! failed scrape is recovered by running the whole cycle again.

use shared::Location;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Provider errors
    #[error("HTTP error {status} from {endpoint}")]
    Http { status: u16, endpoint: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse weather payload: {0}")]
    Parse(#[from] serde_json::Error),

    // Storage errors
    #[error("Location not found: {0}")]
    LocationNotFound(Location),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Startup errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl AppError {
    /// HTTP status carried by a provider error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Http { status, .. } => Some(*status),
            AppError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias used throughout the crate
pub type AppResult<T> = Result<T, AppError>;
