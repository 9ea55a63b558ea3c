//! Tomorrow.io API client for fetching hourly weather timelines
//!
//! Requests are paced: no two requests leave one client closer together than
//! its `request_interval`, regardless of which location or endpoint they hit.

use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client};
use serde::Deserialize;
use serde_json::Value;
use shared::{Location, WeatherRecord};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::WeatherSource;
use crate::config::TomorrowConfig;
use crate::error::{AppError, AppResult};

pub const DEFAULT_BASE_URL: &str = "https://api.tomorrow.io/v4";
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_TIMESTEPS: &str = "hourly";

const FORECAST_PATH: &str = "weather/forecast";
const HISTORY_PATH: &str = "weather/history/recent";

/// Tomorrow.io API client
pub struct TomorrowClient {
    client: Client,
    api_key: String,
    base_url: String,
    timesteps: String,
    request_interval: Duration,
    /// When the previous request finished dispatching. Held for the whole
    /// dispatch so concurrent callers share one global pace.
    last_request: Mutex<Option<Instant>>,
}

/// Raw timeline payload; every level may be absent
#[derive(Debug, Default, Deserialize)]
struct TimelinesResponse {
    #[serde(default)]
    timelines: Option<Timelines>,
}

#[derive(Debug, Default, Deserialize)]
struct Timelines {
    #[serde(default)]
    hourly: Option<Vec<WeatherRecord>>,
}

/// Convert a Tomorrow.io timelines document into weather records.
///
/// A document without `timelines` or without `timelines.hourly` is an empty
/// payload and yields no records. Entries that do not match the record shape
/// are a parse error.
pub fn process_json(data: Value) -> AppResult<Vec<WeatherRecord>> {
    let response: TimelinesResponse = serde_json::from_value(data)?;
    Ok(response
        .timelines
        .and_then(|timelines| timelines.hourly)
        .unwrap_or_default())
}

impl TomorrowClient {
    /// Create a new TomorrowClient against the public API
    pub fn new(api_key: impl Into<String>) -> AppResult<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a new TomorrowClient with custom base URL (for testing)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> AppResult<Self> {
        Self::build(
            api_key.into(),
            base_url.into(),
            DEFAULT_TIMESTEPS.to_string(),
            DEFAULT_REQUEST_INTERVAL,
            DEFAULT_TIMEOUT,
        )
    }

    /// Create a client from the `tomorrow` configuration section
    pub fn from_config(config: &TomorrowConfig) -> AppResult<Self> {
        Self::build(
            config.api_key.clone(),
            config.base_url.clone(),
            config.timesteps.clone(),
            config.request_interval(),
            config.timeout(),
        )
    }

    fn build(
        api_key: String,
        base_url: String,
        timesteps: String,
        request_interval: Duration,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timesteps,
            request_interval,
            last_request: Mutex::new(None),
        })
    }

    /// Override the minimum spacing between requests
    pub fn with_request_interval(mut self, request_interval: Duration) -> Self {
        self.request_interval = request_interval;
        self
    }

    pub fn request_interval(&self) -> Duration {
        self.request_interval
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a paced GET request and decode the JSON body.
    ///
    /// Waits until at least `request_interval` has passed since the previous
    /// request through this client. Non-2xx responses fail with
    /// [`AppError::Http`]; nothing is retried.
    pub async fn get(&self, url: &str, params: &[(&str, String)]) -> AppResult<Value> {
        let mut last_request = self.last_request.lock().await;

        if let Some(previous) = *last_request {
            let elapsed = previous.elapsed();
            if elapsed < self.request_interval {
                let wait = self.request_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?} before {}", wait, url);
                tokio::time::sleep(wait).await;
            }
        }

        tracing::debug!("GET {}", url);
        let sent = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .query(params)
            .send()
            .await;

        // The marker moves on every dispatch, successful or not.
        *last_request = Some(Instant::now());
        drop(last_request);

        let response = sent?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Weather API error: {} from {}", status, url);
            return Err(AppError::Http {
                status: status.as_u16(),
                endpoint: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn fetch_hourly(&self, path: &str, location: &Location) -> AppResult<Vec<WeatherRecord>> {
        let url = format!("{}/{}", self.base_url, path);
        let params = [
            ("location", location.to_canonical_string()),
            ("timesteps", self.timesteps.clone()),
            ("apikey", self.api_key.clone()),
        ];

        let data = self.get(&url, &params).await?;
        let records = process_json(data)?;
        tracing::debug!("Fetched {} records from {} for {}", records.len(), path, location);
        Ok(records)
    }
}

#[async_trait]
impl WeatherSource for TomorrowClient {
    async fn get_forecast(&self, location: &Location) -> AppResult<Vec<WeatherRecord>> {
        self.fetch_hourly(FORECAST_PATH, location).await
    }

    async fn get_history(&self, location: &Location) -> AppResult<Vec<WeatherRecord>> {
        self.fetch_hourly(HISTORY_PATH, location).await
    }
}
