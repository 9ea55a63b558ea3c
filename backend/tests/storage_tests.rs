//! Storage engine tests
//!
//! Exercises the reconciliation contract against the in-memory store:
//! - Idempotent batch upserts
//! - Forecast rows superseded by history for the same timestamp
//! - Value overwrite without row growth
//! - Unknown location rejection
//! - Location listing order and filtering

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use shared::{DataKind, Location, WeatherRecord, WeatherValues};
use weather_scraper::{AppError, InMemoryWeatherStore, OverwritePolicy, WeatherStore};

const LOCATION: Location = Location {
    latitude: 25.86,
    longitude: -97.42,
};

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
}

/// Hourly records starting at `start`, with temperatures 30, 31, ...
fn generate_weather_data(start: DateTime<Utc>, count: usize) -> Vec<WeatherRecord> {
    (0..count)
        .map(|index| {
            WeatherRecord::new(
                start + Duration::hours(index as i64),
                WeatherValues {
                    temperature: Some(30.0 + index as f64),
                    temperature_apparent: Some(32.0 + index as f64),
                    ..Default::default()
                },
            )
        })
        .collect()
}

fn with_temperature_offset(records: &[WeatherRecord], offset: f64) -> Vec<WeatherRecord> {
    records
        .iter()
        .map(|record| {
            let mut record = record.clone();
            record.values.temperature = record.values.temperature.map(|t| t + offset);
            record
        })
        .collect()
}

// ============================================================================
// Batch Upsert
// ============================================================================

#[tokio::test]
async fn test_store_forecast() {
    let store = InMemoryWeatherStore::with_locations([LOCATION]);
    let data = generate_weather_data(start_time(), 3);

    store.store_forecast(&LOCATION, &data).await.unwrap();

    assert_eq!(store.get_count().await.unwrap(), 3);
    assert_eq!(store.get_forecast(&LOCATION).await.unwrap(), data);
    assert!(store.get_history(&LOCATION).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_store_forecast_update_with_new_rows() {
    let store = InMemoryWeatherStore::with_locations([LOCATION]);
    let data = generate_weather_data(start_time(), 5);

    store.store_forecast(&LOCATION, &data[..3]).await.unwrap();
    assert_eq!(store.get_count().await.unwrap(), 3);

    store.store_forecast(&LOCATION, &data[3..]).await.unwrap();
    assert_eq!(store.get_count().await.unwrap(), 5);
}

#[tokio::test]
async fn test_store_same_batch_twice_is_idempotent() {
    let store = InMemoryWeatherStore::with_locations([LOCATION]);
    let data = generate_weather_data(start_time(), 24);

    store.store_history(&LOCATION, &data).await.unwrap();
    let first = store.get_history(&LOCATION).await.unwrap();

    store.store_history(&LOCATION, &data).await.unwrap();

    assert_eq!(store.get_count().await.unwrap(), 24);
    assert_eq!(store.get_history(&LOCATION).await.unwrap(), first);
}

#[tokio::test]
async fn test_new_forecast_overwrites_values() {
    let store = InMemoryWeatherStore::with_locations([LOCATION]);
    let data = generate_weather_data(start_time(), 3);
    store.store_forecast(&LOCATION, &data).await.unwrap();

    let updated = with_temperature_offset(&data, 10.0);
    store.store_forecast(&LOCATION, &updated).await.unwrap();

    assert_eq!(store.get_count().await.unwrap(), 3);
    assert_eq!(store.get_forecast(&LOCATION).await.unwrap(), updated);
}

#[tokio::test]
async fn test_overwrite_replaces_whole_row() {
    let store = InMemoryWeatherStore::with_locations([LOCATION]);
    let data = generate_weather_data(start_time(), 1);
    store.store_forecast(&LOCATION, &data).await.unwrap();

    // A field missing from the newer sample must not survive from the older one
    let sparse = vec![WeatherRecord::new(
        data[0].time,
        WeatherValues {
            humidity: Some(55.0),
            ..Default::default()
        },
    )];
    store.store_forecast(&LOCATION, &sparse).await.unwrap();

    let stored = store.get_forecast(&LOCATION).await.unwrap();
    assert_eq!(stored, sparse);
    assert_eq!(stored[0].values.temperature, None);
}

#[tokio::test]
async fn test_history_supersedes_forecast() {
    let store = InMemoryWeatherStore::with_locations([LOCATION]);
    let data = generate_weather_data(start_time(), 3);
    store.store_forecast(&LOCATION, &data).await.unwrap();

    let observed = with_temperature_offset(&data, 10.0);
    store.store_history(&LOCATION, &observed).await.unwrap();

    assert_eq!(store.get_count().await.unwrap(), 3);
    assert!(store.get_forecast(&LOCATION).await.unwrap().is_empty());
    assert_eq!(store.get_history(&LOCATION).await.unwrap(), observed);
}

#[tokio::test]
async fn test_late_forecast_replaces_history_by_default() {
    let store = InMemoryWeatherStore::with_locations([LOCATION]);
    let data = generate_weather_data(start_time(), 2);
    store.store_history(&LOCATION, &data).await.unwrap();

    store.store_forecast(&LOCATION, &data).await.unwrap();

    assert_eq!(store.get_forecast(&LOCATION).await.unwrap(), data);
    assert!(store.get_history(&LOCATION).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_preserve_history_policy_keeps_history_rows() {
    let store = InMemoryWeatherStore::with_policy(OverwritePolicy::PreserveHistory);
    store.add_location(&LOCATION, true);

    let history = generate_weather_data(start_time(), 2);
    store.store_history(&LOCATION, &history).await.unwrap();

    // Overlaps both history hours and adds one new hour
    let forecast = with_temperature_offset(&generate_weather_data(start_time(), 3), 5.0);
    store.store_forecast(&LOCATION, &forecast).await.unwrap();

    assert_eq!(store.get_count().await.unwrap(), 3);
    assert_eq!(store.get_history(&LOCATION).await.unwrap(), history);
    assert_eq!(store.get_forecast(&LOCATION).await.unwrap(), forecast[2..].to_vec());
}

#[tokio::test]
async fn test_records_read_back_in_time_order() {
    let store = InMemoryWeatherStore::with_locations([LOCATION]);
    let mut data = generate_weather_data(start_time(), 4);
    data.reverse();

    store.store_forecast(&LOCATION, &data).await.unwrap();

    let stored = store.get_forecast(&LOCATION).await.unwrap();
    let times: Vec<_> = stored.iter().map(|r| r.time).collect();
    let mut sorted = times.clone();
    sorted.sort();
    assert_eq!(times, sorted);
}

// ============================================================================
// Rejections and Empty Batches
// ============================================================================

#[tokio::test]
async fn test_unknown_location_is_rejected() {
    let store = InMemoryWeatherStore::with_locations([LOCATION]);
    let unknown = Location::new(40.71, -74.01);
    let data = generate_weather_data(start_time(), 3);

    let err = store.store_forecast(&unknown, &data).await.unwrap_err();
    assert!(matches!(err, AppError::LocationNotFound(loc) if loc == unknown));

    let err = store.store_history(&unknown, &data).await.unwrap_err();
    assert!(matches!(err, AppError::LocationNotFound(_)));

    assert_eq!(store.get_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_batch_is_a_no_op() {
    let store = InMemoryWeatherStore::with_locations([LOCATION]);
    store
        .store_forecast(&LOCATION, &generate_weather_data(start_time(), 2))
        .await
        .unwrap();

    store.store_forecast(&LOCATION, &[]).await.unwrap();
    store.store_history(&LOCATION, &[]).await.unwrap();

    assert_eq!(store.get_count().await.unwrap(), 2);
}

// ============================================================================
// Locations
// ============================================================================

#[tokio::test]
async fn test_get_locations_sorted_distinct_and_active() {
    let store = InMemoryWeatherStore::new();
    store.add_location(&Location::new(25.9, -97.48), true);
    store.add_location(&Location::new(25.86, -97.42), true);
    store.add_location(&Location::new(25.9, -97.52), true);
    store.add_location(&Location::new(25.86, -97.42), true);
    store.add_location(&Location::new(10.0, 10.0), false);

    let active = store.get_locations(true).await.unwrap();
    assert_eq!(
        active,
        vec![
            Location::new(25.86, -97.42),
            Location::new(25.9, -97.52),
            Location::new(25.9, -97.48),
        ]
    );

    let all = store.get_locations(false).await.unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0], Location::new(10.0, 10.0));
}

#[tokio::test]
async fn test_rows_are_partitioned_by_location() {
    let other = Location::new(25.9, -97.52);
    let store = InMemoryWeatherStore::with_locations([LOCATION, other]);
    let data = generate_weather_data(start_time(), 3);

    store.store_forecast(&LOCATION, &data).await.unwrap();
    store.store_forecast(&other, &data).await.unwrap();

    assert_eq!(store.get_count().await.unwrap(), 6);
    assert_eq!(store.get_forecast(&other).await.unwrap(), data);
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
    }

    proptest! {
        /// Re-storing any batch never changes the row count or the reads
        #[test]
        fn prop_store_is_idempotent(count in 0usize..48, is_forecast in any::<bool>()) {
            let rt = runtime();
            let store = InMemoryWeatherStore::with_locations([LOCATION]);
            let data = generate_weather_data(start_time(), count);
            let kind = DataKind::from_is_forecast(is_forecast);

            let (first_count, first_read, second_count, second_read) = rt.block_on(async {
                store.store_data(&LOCATION, &data, kind).await.unwrap();
                let first_count = store.get_count().await.unwrap();
                let first_read = store.get_data(&LOCATION, kind).await.unwrap();
                store.store_data(&LOCATION, &data, kind).await.unwrap();
                let second_count = store.get_count().await.unwrap();
                let second_read = store.get_data(&LOCATION, kind).await.unwrap();
                (first_count, first_read, second_count, second_read)
            });

            prop_assert_eq!(first_count, count as i64);
            prop_assert_eq!(second_count, first_count);
            prop_assert_eq!(&first_read, &data);
            prop_assert_eq!(&second_read, &first_read);
        }

        /// History for overlapping hours removes those hours from the forecast
        #[test]
        fn prop_history_supersedes_overlap(
            forecast_hours in 1usize..48,
            history_offset in 0i64..48,
            history_hours in 1usize..24
        ) {
            let rt = runtime();
            let store = InMemoryWeatherStore::with_locations([LOCATION]);
            let forecast = generate_weather_data(start_time(), forecast_hours);
            let history = generate_weather_data(start_time() + Duration::hours(history_offset), history_hours);

            let (count, forecast_read, history_read) = rt.block_on(async {
                store.store_forecast(&LOCATION, &forecast).await.unwrap();
                store.store_history(&LOCATION, &history).await.unwrap();
                (
                    store.get_count().await.unwrap(),
                    store.get_forecast(&LOCATION).await.unwrap(),
                    store.get_history(&LOCATION).await.unwrap(),
                )
            });

            // Size of the union of [0, forecast) and [offset, offset + history)
            let forecast_end = forecast_hours as i64;
            let history_end = history_offset + history_hours as i64;
            let expected_count = if history_offset >= forecast_end {
                forecast_end + history_hours as i64
            } else {
                forecast_end.max(history_end)
            };

            prop_assert_eq!(count, expected_count);
            prop_assert_eq!(history_read, history.clone());
            for record in &forecast_read {
                prop_assert!(!history.iter().any(|h| h.time == record.time));
            }
        }
    }
}
