//! PostgreSQL implementation of the weather store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{DataKind, Location, WeatherRecord, WeatherValues};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;

use super::{OverwritePolicy, WeatherStore};
use crate::error::{AppError, AppResult};

/// Measurement columns of the `weather` table, in bind order
const VALUE_COLUMNS: [&str; 30] = [
    "temperature",
    "temperature_apparent",
    "dew_point",
    "humidity",
    "pressure_surface_level",
    "wind_speed",
    "wind_gust",
    "wind_direction",
    "precipitation_probability",
    "rain_intensity",
    "rain_accumulation",
    "rain_accumulation_lwe",
    "snow_intensity",
    "snow_accumulation",
    "snow_accumulation_lwe",
    "snow_depth",
    "sleet_intensity",
    "sleet_accumulation",
    "sleet_accumulation_lwe",
    "freezing_rain_intensity",
    "ice_accumulation",
    "ice_accumulation_lwe",
    "cloud_base",
    "cloud_ceiling",
    "cloud_cover",
    "evapotranspiration",
    "uv_index",
    "uv_health_concern",
    "visibility",
    "weather_code",
];

/// Postgres accepts at most 65535 bind parameters per statement
const MAX_BIND_PARAMS: usize = 65_535;
const COLUMNS_PER_ROW: usize = 3 + VALUE_COLUMNS.len();
const ROWS_PER_STATEMENT: usize = MAX_BIND_PARAMS / COLUMNS_PER_ROW;

/// PostgreSQL-backed weather store
#[derive(Clone)]
pub struct PostgresWeatherStore {
    db: PgPool,
    policy: OverwritePolicy,
}

/// Weather row as read back from the database
#[derive(Debug, FromRow)]
struct WeatherRow {
    time: DateTime<Utc>,
    temperature: Option<f64>,
    temperature_apparent: Option<f64>,
    dew_point: Option<f64>,
    humidity: Option<f64>,
    pressure_surface_level: Option<f64>,
    wind_speed: Option<f64>,
    wind_gust: Option<f64>,
    wind_direction: Option<f64>,
    precipitation_probability: Option<f64>,
    rain_intensity: Option<f64>,
    rain_accumulation: Option<f64>,
    rain_accumulation_lwe: Option<f64>,
    snow_intensity: Option<f64>,
    snow_accumulation: Option<f64>,
    snow_accumulation_lwe: Option<f64>,
    snow_depth: Option<f64>,
    sleet_intensity: Option<f64>,
    sleet_accumulation: Option<f64>,
    sleet_accumulation_lwe: Option<f64>,
    freezing_rain_intensity: Option<f64>,
    ice_accumulation: Option<f64>,
    ice_accumulation_lwe: Option<f64>,
    cloud_base: Option<f64>,
    cloud_ceiling: Option<f64>,
    cloud_cover: Option<f64>,
    evapotranspiration: Option<f64>,
    uv_index: Option<f64>,
    uv_health_concern: Option<f64>,
    visibility: Option<f64>,
    weather_code: Option<i32>,
}

impl From<WeatherRow> for WeatherRecord {
    fn from(row: WeatherRow) -> Self {
        WeatherRecord {
            time: row.time,
            values: WeatherValues {
                temperature: row.temperature,
                temperature_apparent: row.temperature_apparent,
                dew_point: row.dew_point,
                humidity: row.humidity,
                pressure_surface_level: row.pressure_surface_level,
                wind_speed: row.wind_speed,
                wind_gust: row.wind_gust,
                wind_direction: row.wind_direction,
                precipitation_probability: row.precipitation_probability,
                rain_intensity: row.rain_intensity,
                rain_accumulation: row.rain_accumulation,
                rain_accumulation_lwe: row.rain_accumulation_lwe,
                snow_intensity: row.snow_intensity,
                snow_accumulation: row.snow_accumulation,
                snow_accumulation_lwe: row.snow_accumulation_lwe,
                snow_depth: row.snow_depth,
                sleet_intensity: row.sleet_intensity,
                sleet_accumulation: row.sleet_accumulation,
                sleet_accumulation_lwe: row.sleet_accumulation_lwe,
                freezing_rain_intensity: row.freezing_rain_intensity,
                ice_accumulation: row.ice_accumulation,
                ice_accumulation_lwe: row.ice_accumulation_lwe,
                cloud_base: row.cloud_base,
                cloud_ceiling: row.cloud_ceiling,
                cloud_cover: row.cloud_cover,
                evapotranspiration: row.evapotranspiration,
                uv_index: row.uv_index,
                uv_health_concern: row.uv_health_concern,
                visibility: row.visibility,
                weather_code: row.weather_code,
            },
        }
    }
}

impl PostgresWeatherStore {
    /// Create a store that replaces rows on every write
    pub fn new(db: PgPool) -> Self {
        Self::with_policy(db, OverwritePolicy::default())
    }

    pub fn with_policy(db: PgPool, policy: OverwritePolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> OverwritePolicy {
        self.policy
    }

    /// Register a location row. Locations are normally provisioned out of
    /// band; this exists for operators and tests.
    pub async fn add_location(&self, location: &Location, is_active: bool) -> AppResult<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO location (latitude, longitude, is_active)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(is_active)
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }

    /// Resolve a location id inside the write transaction
    async fn location_id(
        tx: &mut Transaction<'_, Postgres>,
        location: &Location,
    ) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            SELECT id FROM location
            WHERE latitude = $1 AND longitude = $2
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(location.latitude)
        .bind(location.longitude)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::LocationNotFound(*location))
    }

    fn upsert_prefix() -> String {
        format!(
            "INSERT INTO weather (location_id, time, is_forecast, {}) ",
            VALUE_COLUMNS.join(", ")
        )
    }

    fn conflict_clause(policy: OverwritePolicy, kind: DataKind) -> String {
        let assignments: Vec<String> = std::iter::once("is_forecast")
            .chain(VALUE_COLUMNS)
            .map(|column| format!("{column} = EXCLUDED.{column}"))
            .collect();

        let mut clause = format!(
            " ON CONFLICT (location_id, time) DO UPDATE SET {}",
            assignments.join(", ")
        );
        if !policy.allows(DataKind::History, kind) {
            clause.push_str(" WHERE weather.is_forecast");
        }
        clause
    }
}

/// Keep only the last record per timestamp, in first-seen order.
///
/// One `INSERT .. ON CONFLICT` statement cannot touch the same row twice, so
/// duplicates inside a batch are collapsed with the last one winning.
fn latest_per_time(records: &[WeatherRecord]) -> Vec<&WeatherRecord> {
    let mut positions: HashMap<DateTime<Utc>, usize> = HashMap::with_capacity(records.len());
    let mut latest: Vec<&WeatherRecord> = Vec::with_capacity(records.len());

    for record in records {
        match positions.get(&record.time) {
            Some(&index) => latest[index] = record,
            None => {
                positions.insert(record.time, latest.len());
                latest.push(record);
            }
        }
    }
    latest
}

#[async_trait]
impl WeatherStore for PostgresWeatherStore {
    async fn store_data(
        &self,
        location: &Location,
        records: &[WeatherRecord],
        kind: DataKind,
    ) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        // Fail before any row is written
        let location_id = Self::location_id(&mut tx, location).await?;

        let records = latest_per_time(records);
        let conflict_clause = Self::conflict_clause(self.policy, kind);
        let mut written: u64 = 0;

        for chunk in records.chunks(ROWS_PER_STATEMENT) {
            let mut query: QueryBuilder<Postgres> = QueryBuilder::new(Self::upsert_prefix());

            query.push_values(chunk, |mut row, record| {
                let v = &record.values;
                row.push_bind(location_id)
                    .push_bind(record.time)
                    .push_bind(kind.is_forecast())
                    .push_bind(v.temperature)
                    .push_bind(v.temperature_apparent)
                    .push_bind(v.dew_point)
                    .push_bind(v.humidity)
                    .push_bind(v.pressure_surface_level)
                    .push_bind(v.wind_speed)
                    .push_bind(v.wind_gust)
                    .push_bind(v.wind_direction)
                    .push_bind(v.precipitation_probability)
                    .push_bind(v.rain_intensity)
                    .push_bind(v.rain_accumulation)
                    .push_bind(v.rain_accumulation_lwe)
                    .push_bind(v.snow_intensity)
                    .push_bind(v.snow_accumulation)
                    .push_bind(v.snow_accumulation_lwe)
                    .push_bind(v.snow_depth)
                    .push_bind(v.sleet_intensity)
                    .push_bind(v.sleet_accumulation)
                    .push_bind(v.sleet_accumulation_lwe)
                    .push_bind(v.freezing_rain_intensity)
                    .push_bind(v.ice_accumulation)
                    .push_bind(v.ice_accumulation_lwe)
                    .push_bind(v.cloud_base)
                    .push_bind(v.cloud_ceiling)
                    .push_bind(v.cloud_cover)
                    .push_bind(v.evapotranspiration)
                    .push_bind(v.uv_index)
                    .push_bind(v.uv_health_concern)
                    .push_bind(v.visibility)
                    .push_bind(v.weather_code);
            });
            query.push(&conflict_clause);

            let result = query.build().execute(&mut *tx).await?;
            written += result.rows_affected();
        }

        tx.commit().await?;

        let skipped = records.len() as u64 - written.min(records.len() as u64);
        if skipped > 0 {
            tracing::warn!(
                "Kept {} stored history rows for {} instead of overwriting them with forecasts",
                skipped,
                location
            );
        }
        tracing::debug!("Upserted {} {} rows for {}", written, kind.as_str(), location);

        Ok(())
    }

    async fn get_data(&self, location: &Location, kind: DataKind) -> AppResult<Vec<WeatherRecord>> {
        tracing::info!("Getting {} data for {}", kind.as_str(), location);

        let sql = format!(
            r#"
            SELECT w.time, {}
            FROM weather w
            JOIN location l ON w.location_id = l.id
            WHERE l.latitude = $1
              AND l.longitude = $2
              AND w.is_forecast = $3
            ORDER BY w.time
            "#,
            VALUE_COLUMNS
                .iter()
                .map(|column| format!("w.{column}"))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let rows = sqlx::query_as::<_, WeatherRow>(&sql)
            .bind(location.latitude)
            .bind(location.longitude)
            .bind(kind.is_forecast())
            .fetch_all(&self.db)
            .await?;

        Ok(rows.into_iter().map(WeatherRecord::from).collect())
    }

    async fn get_locations(&self, active_only: bool) -> AppResult<Vec<Location>> {
        tracing::info!("Getting locations");

        let filter_clause = if active_only {
            "WHERE is_active = TRUE"
        } else {
            ""
        };
        let sql = format!(
            r#"
            SELECT DISTINCT latitude, longitude
            FROM location
            {filter_clause}
            ORDER BY latitude, longitude
            "#
        );

        let rows = sqlx::query_as::<_, (f64, f64)>(&sql)
            .fetch_all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(latitude, longitude)| Location::new(latitude, longitude))
            .collect())
    }

    async fn get_count(&self) -> AppResult<i64> {
        tracing::info!("Counting number of weather entries");

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM weather")
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }
}
