/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use super::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use telemetry_bus::Reading;

/// Readings older than this many days are purged by the store adapters.
pub const DEFAULT_RETENTION_DAYS: i64 = 60;

/// Selects readings by full topic within an inclusive time window.
///
/// An empty `topics` list selects nothing. Missing bounds leave that side of
/// the window open.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SensorQuery {
    pub topics: Vec<String>,
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl SensorQuery {
    pub fn new(topics: Vec<String>) -> Self {
        Self {
            topics,
            begin: None,
            end: None,
        }
    }

    pub fn between(
        mut self,
        begin: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.begin = begin;
        self.end = end;
        self
    }

    pub fn selects(&self, reading: &Reading) -> bool {
        self.topics.iter().any(|topic| *topic == reading.full_topic)
            && self.begin.map_or(true, |begin| reading.timestamp >= begin)
            && self.end.map_or(true, |end| reading.timestamp <= end)
    }
}

/// Time-series persistence for sensor readings.
///
/// Methods are driven on the storage bridge runtime, never on the thread
/// that produced the data.
#[async_trait]
pub trait SensorStore: Send + Sync {
    /// Creates the `(full_topic, timestamp)` and retention indexes. Idempotent.
    async fn ensure_indexes(&self) -> Result<(), StorageError>;

    /// Appends a batch and returns how many readings were written. Readings
    /// already outside the retention window are not written.
    async fn insert_batch(&self, readings: &[Reading]) -> Result<usize, StorageError>;

    /// Matching readings in timestamp order.
    async fn query(&self, query: &SensorQuery) -> Result<Vec<Reading>, StorageError>;

    /// Deletes matching readings and returns how many were removed.
    async fn erase(&self, query: &SensorQuery) -> Result<usize, StorageError>;
}

/// Volatile sensor store. Retention is applied on every insert.
pub struct MemorySensorStore {
    retention: Duration,
    readings: Mutex<Vec<Reading>>,
}

impl Default for MemorySensorStore {
    fn default() -> Self {
        Self::with_retention(Duration::days(DEFAULT_RETENTION_DAYS))
    }
}

impl MemorySensorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            retention,
            readings: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.readings().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops readings that fell out of the retention window as of `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let mut stored = self.readings();
        let before = stored.len();
        stored.retain(|reading| reading.timestamp >= cutoff);
        before - stored.len()
    }

    fn readings(&self) -> MutexGuard<'_, Vec<Reading>> {
        self.readings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SensorStore for MemorySensorStore {
    async fn ensure_indexes(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn insert_batch(&self, readings: &[Reading]) -> Result<usize, StorageError> {
        let now = Utc::now();
        let cutoff = now - self.retention;
        let written = {
            let mut stored = self.readings();
            let before = stored.len();
            stored.extend(
                readings
                    .iter()
                    .filter(|reading| reading.timestamp >= cutoff)
                    .cloned(),
            );
            stored.len() - before
        };
        self.purge_expired(now);
        Ok(written)
    }

    async fn query(&self, query: &SensorQuery) -> Result<Vec<Reading>, StorageError> {
        let mut matching: Vec<Reading> = self
            .readings()
            .iter()
            .filter(|reading| query.selects(reading))
            .cloned()
            .collect();
        matching.sort_by_key(|reading| reading.timestamp);
        Ok(matching)
    }

    async fn erase(&self, query: &SensorQuery) -> Result<usize, StorageError> {
        let mut stored = self.readings();
        let before = stored.len();
        stored.retain(|reading| !query.selects(reading));
        Ok(before - stored.len())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemorySensorStore, SensorQuery, SensorStore};
    use chrono::{Duration, TimeZone, Utc};
    use telemetry_bus::Reading;

    #[test]
    fn window_bounds_are_inclusive() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let reading = Reading::new("gw1-temperature-0", at, 21.0);

        let exact = SensorQuery::new(vec!["gw1-temperature-0".to_string()]).between(Some(at), Some(at));
        assert!(exact.selects(&reading));

        let later = exact.clone().between(Some(at + Duration::seconds(1)), None);
        assert!(!later.selects(&reading));

        assert!(!SensorQuery::new(Vec::new()).selects(&reading));
    }

    #[tokio::test]
    async fn query_orders_by_timestamp_and_erase_counts() {
        let store = MemorySensorStore::new();
        let now = Utc::now();
        store
            .insert_batch(&[
                Reading::new("gw1-temperature-0", now, 2.0),
                Reading::new("gw1-temperature-0", now - Duration::minutes(1), 1.0),
                Reading::new("gw1-pressure-0", now, 100.0),
            ])
            .await
            .unwrap();

        let query = SensorQuery::new(vec!["gw1-temperature-0".to_string()]);
        let values: Vec<f64> = store
            .query(&query)
            .await
            .unwrap()
            .iter()
            .map(|reading| reading.value)
            .collect();
        assert_eq!(values, vec![1.0, 2.0]);

        assert_eq!(store.erase(&query).await.unwrap(), 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn readings_outside_retention_are_purged() {
        let store = MemorySensorStore::with_retention(Duration::days(1));
        let now = Utc::now();
        let written = store
            .insert_batch(&[
                Reading::new("gw1-temperature-0", now - Duration::days(2), 1.0),
                Reading::new("gw1-temperature-0", now, 2.0),
            ])
            .await
            .unwrap();

        assert_eq!(written, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.purge_expired(now + Duration::days(2)), 1);
        assert!(store.is_empty());
    }
}
