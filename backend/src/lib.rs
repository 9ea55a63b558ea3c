//! Weather scraper
//!
//! Pulls hourly forecast and recent history timelines from Tomorrow.io for
//! every active location and reconciles them into PostgreSQL, one row per
//! (location, time).

pub mod config;
pub mod error;
pub mod external;
pub mod services;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use external::{process_json, TomorrowClient, WeatherSource};
pub use services::{ScrapeSummary, Scraper};
pub use storage::{InMemoryWeatherStore, OverwritePolicy, PostgresWeatherStore, WeatherStore};
