//! In-memory implementation of the weather store, used by tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shared::{DataKind, Location, WeatherRecord, WeatherValues};
use std::collections::BTreeMap;

use super::{OverwritePolicy, WeatherStore};
use crate::error::{AppError, AppResult};

/// Weather store kept entirely in process memory.
///
/// Honours the same contract as the SQL store: unknown locations are
/// rejected, each batch is applied under one write lock, and rows are keyed
/// by (canonical location, time).
#[derive(Default)]
pub struct InMemoryWeatherStore {
    policy: OverwritePolicy,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    locations: Vec<(Location, bool)>,
    rows: BTreeMap<(String, DateTime<Utc>), StoredRow>,
}

#[derive(Debug, Clone)]
struct StoredRow {
    kind: DataKind,
    values: WeatherValues,
}

impl InMemoryWeatherStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: OverwritePolicy) -> Self {
        Self {
            policy,
            inner: RwLock::default(),
        }
    }

    /// Store with the given locations registered as active
    pub fn with_locations(locations: impl IntoIterator<Item = Location>) -> Self {
        let store = Self::new();
        for location in locations {
            store.add_location(&location, true);
        }
        store
    }

    /// Register a location
    pub fn add_location(&self, location: &Location, is_active: bool) {
        self.inner.write().locations.push((*location, is_active));
    }
}

impl Inner {
    fn is_known(&self, location: &Location) -> bool {
        self.locations.iter().any(|(known, _)| known == location)
    }
}

#[async_trait]
impl WeatherStore for InMemoryWeatherStore {
    async fn store_data(
        &self,
        location: &Location,
        records: &[WeatherRecord],
        kind: DataKind,
    ) -> AppResult<()> {
        let mut inner = self.inner.write();
        if !inner.is_known(location) {
            return Err(AppError::LocationNotFound(*location));
        }

        let key = location.to_canonical_string();
        for record in records {
            let row_key = (key.clone(), record.time);
            if let Some(existing) = inner.rows.get(&row_key) {
                if !self.policy.allows(existing.kind, kind) {
                    continue;
                }
            }
            inner.rows.insert(
                row_key,
                StoredRow {
                    kind,
                    values: record.values.clone(),
                },
            );
        }
        Ok(())
    }

    async fn get_data(&self, location: &Location, kind: DataKind) -> AppResult<Vec<WeatherRecord>> {
        let key = location.to_canonical_string();
        let inner = self.inner.read();

        Ok(inner
            .rows
            .iter()
            .filter(|((row_location, _), row)| *row_location == key && row.kind == kind)
            .map(|((_, time), row)| WeatherRecord::new(*time, row.values.clone()))
            .collect())
    }

    async fn get_locations(&self, active_only: bool) -> AppResult<Vec<Location>> {
        let inner = self.inner.read();
        let mut locations: Vec<Location> = inner
            .locations
            .iter()
            .filter(|(_, is_active)| *is_active || !active_only)
            .map(|(location, _)| *location)
            .collect();

        locations.sort_by(|a, b| {
            a.latitude
                .total_cmp(&b.latitude)
                .then(a.longitude.total_cmp(&b.longitude))
        });
        locations.dedup();
        Ok(locations)
    }

    async fn get_count(&self) -> AppResult<i64> {
        Ok(self.inner.read().rows.len() as i64)
    }
}
