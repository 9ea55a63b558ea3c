//! External API integrations

use async_trait::async_trait;
use shared::{Location, WeatherRecord};

use crate::error::AppResult;

pub mod tomorrow;

pub use tomorrow::{process_json, TomorrowClient};

/// A provider of hourly weather samples for a location
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Forward-looking samples, in provider order
    async fn get_forecast(&self, location: &Location) -> AppResult<Vec<WeatherRecord>>;

    /// Recent observed samples, in provider order
    async fn get_history(&self, location: &Location) -> AppResult<Vec<WeatherRecord>>;
}
