//! Scrape orchestration: fetch from the provider, write to the store
//!
//! Locations are processed strictly one after another. The first error
//! aborts the pass; batches committed for earlier locations stay committed
//! and later locations are left untouched. Re-running a whole cycle is always
//! safe because every write is an idempotent upsert.

use serde::Serialize;
use shared::Location;

use crate::error::AppResult;
use crate::external::WeatherSource;
use crate::storage::WeatherStore;

/// Drives one ingestion cycle over the active locations
pub struct Scraper<C, S> {
    client: C,
    store: S,
}

/// Outcome of a full scrape cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeSummary {
    pub locations: usize,
    pub forecast_records: usize,
    pub history_records: usize,
}

impl<C: WeatherSource, S: WeatherStore> Scraper<C, S> {
    pub fn new(client: C, store: S) -> Self {
        Self { client, store }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Scrape and store forecast data for the given locations
    pub async fn scrape_forecast(&self, locations: &[Location]) -> AppResult<usize> {
        let mut total = 0;
        for location in locations {
            tracing::info!("Scraping forecast data for {}", location);
            let records = self.client.get_forecast(location).await?;
            self.store.store_forecast(location, &records).await?;
            total += records.len();
        }
        Ok(total)
    }

    /// Scrape and store recent history data for the given locations
    pub async fn scrape_history(&self, locations: &[Location]) -> AppResult<usize> {
        let mut total = 0;
        for location in locations {
            tracing::info!("Scraping history data for {}", location);
            let records = self.client.get_history(location).await?;
            self.store.store_history(location, &records).await?;
            total += records.len();
        }
        Ok(total)
    }

    /// Scrape and store forecast, then history, for every active location
    pub async fn scrape(&self) -> AppResult<ScrapeSummary> {
        tracing::info!("Scraping forecast and historical weather data");
        let locations = self.store.get_locations(true).await?;

        let forecast_records = self.scrape_forecast(&locations).await?;
        let history_records = self.scrape_history(&locations).await?;

        Ok(ScrapeSummary {
            locations: locations.len(),
            forecast_records,
            history_records,
        })
    }
}
