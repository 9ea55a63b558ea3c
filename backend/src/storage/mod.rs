//! Storage engine for weather records
//!
//! Rows are keyed by (location, time). Whatever its origin, a later write for
//! a timestamp replaces the whole stored row, including its forecast flag, so
//! repeated scrapes of one window converge instead of accumulating duplicates.

use async_trait::async_trait;
use serde::Deserialize;
use shared::{DataKind, Location, WeatherRecord};

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryWeatherStore;
pub use postgres::PostgresWeatherStore;

/// Whether a forecast write may replace a row that already holds history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    /// Every write replaces the stored row, whatever its origin
    #[default]
    Replace,
    /// Forecast writes skip timestamps that already hold history
    PreserveHistory,
}

impl OverwritePolicy {
    /// Whether a write of `incoming` may replace a row of `existing` origin
    pub fn allows(&self, existing: DataKind, incoming: DataKind) -> bool {
        match self {
            OverwritePolicy::Replace => true,
            OverwritePolicy::PreserveHistory => {
                !(existing == DataKind::History && incoming == DataKind::Forecast)
            }
        }
    }
}

/// Persistent store for forecast and history records.
///
/// Implementations must reject writes for locations they do not know about
/// before touching any row, and must apply each batch atomically.
#[async_trait]
pub trait WeatherStore: Send + Sync {
    /// Upsert a batch of records for a known location
    async fn store_data(
        &self,
        location: &Location,
        records: &[WeatherRecord],
        kind: DataKind,
    ) -> AppResult<()>;

    /// Records of one origin for a location, ordered by time
    async fn get_data(&self, location: &Location, kind: DataKind) -> AppResult<Vec<WeatherRecord>>;

    /// Distinct locations ordered by (latitude, longitude)
    async fn get_locations(&self, active_only: bool) -> AppResult<Vec<Location>>;

    /// Total number of stored weather rows
    async fn get_count(&self) -> AppResult<i64>;

    async fn store_forecast(&self, location: &Location, records: &[WeatherRecord]) -> AppResult<()> {
        tracing::info!("Storing forecast data for {}", location);
        self.store_data(location, records, DataKind::Forecast).await
    }

    async fn store_history(&self, location: &Location, records: &[WeatherRecord]) -> AppResult<()> {
        tracing::info!("Storing historical data for {}", location);
        self.store_data(location, records, DataKind::History).await
    }

    async fn get_forecast(&self, location: &Location) -> AppResult<Vec<WeatherRecord>> {
        self.get_data(location, DataKind::Forecast).await
    }

    async fn get_history(&self, location: &Location) -> AppResult<Vec<WeatherRecord>> {
        self.get_data(location, DataKind::History).await
    }
}
