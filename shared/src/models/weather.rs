//! Weather data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A set of hourly weather measurements.
///
/// Every field is optional because the provider may omit any of them for a
/// given sample; a missing field is `None`, never a substituted default.
/// Field names follow the provider's camelCase wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherValues {
    pub temperature: Option<f64>,
    pub temperature_apparent: Option<f64>,
    pub dew_point: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure_surface_level: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_gust: Option<f64>,
    pub wind_direction: Option<f64>,
    pub precipitation_probability: Option<f64>,
    pub rain_intensity: Option<f64>,
    pub rain_accumulation: Option<f64>,
    pub rain_accumulation_lwe: Option<f64>,
    pub snow_intensity: Option<f64>,
    pub snow_accumulation: Option<f64>,
    pub snow_accumulation_lwe: Option<f64>,
    pub snow_depth: Option<f64>,
    pub sleet_intensity: Option<f64>,
    pub sleet_accumulation: Option<f64>,
    pub sleet_accumulation_lwe: Option<f64>,
    pub freezing_rain_intensity: Option<f64>,
    pub ice_accumulation: Option<f64>,
    pub ice_accumulation_lwe: Option<f64>,
    pub cloud_base: Option<f64>,
    pub cloud_ceiling: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub evapotranspiration: Option<f64>,
    pub uv_index: Option<f64>,
    pub uv_health_concern: Option<f64>,
    pub visibility: Option<f64>,
    pub weather_code: Option<i32>,
}

/// Weather measurements for a single point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub time: DateTime<Utc>,
    pub values: WeatherValues,
}

impl WeatherRecord {
    pub fn new(time: DateTime<Utc>, values: WeatherValues) -> Self {
        Self { time, values }
    }
}

/// Origin of a stored weather row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// Predicted samples for future timestamps
    Forecast,
    /// Observed samples for past timestamps
    History,
}

impl DataKind {
    pub fn is_forecast(&self) -> bool {
        matches!(self, DataKind::Forecast)
    }

    pub fn from_is_forecast(is_forecast: bool) -> Self {
        if is_forecast {
            DataKind::Forecast
        } else {
            DataKind::History
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Forecast => "forecast",
            DataKind::History => "history",
        }
    }
}
