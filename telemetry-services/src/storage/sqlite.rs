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

//! SQLite-backed sensor time series.
//!
//! ```sql
//! CREATE TABLE sensor_data (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     sensor_full_topic TEXT NOT NULL,
//!     timestamp INTEGER NOT NULL,  -- milliseconds since the Unix epoch, UTC
//!     value REAL NOT NULL
//! );
//! CREATE INDEX idx_sensor_data_topic_timestamp ON sensor_data (sensor_full_topic, timestamp);
//! CREATE INDEX idx_sensor_data_timestamp ON sensor_data (timestamp);
//! ```
//!
//! The connection is used synchronously from the storage bridge thread.

use super::error::StorageError;
use super::store::{SensorQuery, SensorStore, DEFAULT_RETENTION_DAYS};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use telemetry_bus::observability::events;
use telemetry_bus::Reading;
use tracing::{debug, info};

const COMPONENT: &str = "sqlite_sensor_store";

pub struct SqliteSensorStore {
    conn: Mutex<Connection>,
    retention: Duration,
    indexes_ready: AtomicBool,
}

impl SqliteSensorStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sensor_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sensor_full_topic TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                value REAL NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            retention: Duration::days(DEFAULT_RETENTION_DAYS),
            indexes_ready: AtomicBool::new(false),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `WHERE` clause and bound values for `query`. Topics bind first.
    fn filter(query: &SensorQuery) -> (String, Vec<SqlValue>) {
        let placeholders = (1..=query.topics.len())
            .map(|position| format!("?{position}"))
            .collect::<Vec<_>>()
            .join(", ");
        let begin = query.topics.len() + 1;
        let end = begin + 1;
        let clause = format!(
            "sensor_full_topic IN ({placeholders})
             AND (?{begin} IS NULL OR timestamp >= ?{begin})
             AND (?{end} IS NULL OR timestamp <= ?{end})"
        );

        let bound = |at: Option<DateTime<Utc>>| {
            at.map_or(SqlValue::Null, |at| SqlValue::Integer(at.timestamp_millis()))
        };
        let mut values: Vec<SqlValue> = query
            .topics
            .iter()
            .map(|topic| SqlValue::Text(topic.clone()))
            .collect();
        values.push(bound(query.begin));
        values.push(bound(query.end));

        (clause, values)
    }

    fn row_to_reading(row: &Row) -> rusqlite::Result<Reading> {
        let timestamp_ms: i64 = row.get(1)?;
        let timestamp = Utc
            .timestamp_millis_opt(timestamp_ms)
            .single()
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(1, timestamp_ms))?;

        Ok(Reading::new(row.get::<_, String>(0)?, timestamp, row.get(2)?))
    }

    /// Drops readings that fell out of the retention window as of `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        Ok(self.conn().execute(
            "DELETE FROM sensor_data WHERE timestamp < ?1",
            params![(now - self.retention).timestamp_millis()],
        )?)
    }
}

#[async_trait]
impl SensorStore for SqliteSensorStore {
    async fn ensure_indexes(&self) -> Result<(), StorageError> {
        if self.indexes_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        self.conn().execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_sensor_data_topic_timestamp
                 ON sensor_data (sensor_full_topic, timestamp);
             CREATE INDEX IF NOT EXISTS idx_sensor_data_timestamp
                 ON sensor_data (timestamp);",
        )?;

        if !self.indexes_ready.swap(true, Ordering::AcqRel) {
            info!(
                event = events::STORAGE_INDEXES_READY,
                component = COMPONENT,
                retention_days = self.retention.num_days(),
                "sensor data indexes ready"
            );
        }
        Ok(())
    }

    async fn insert_batch(&self, readings: &[Reading]) -> Result<usize, StorageError> {
        let now = Utc::now();
        let cutoff = now - self.retention;
        let mut written = 0;
        {
            let mut conn = self.conn();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO sensor_data (sensor_full_topic, timestamp, value)
                     VALUES (?1, ?2, ?3)",
                )?;
                for reading in readings.iter().filter(|reading| reading.timestamp >= cutoff) {
                    written += stmt.execute(params![
                        reading.full_topic,
                        reading.timestamp.timestamp_millis(),
                        reading.value
                    ])?;
                }
            }
            tx.commit()?;
        }

        let purged = self.purge_expired(now)?;
        if purged > 0 || written < readings.len() {
            debug!(
                component = COMPONENT,
                purged,
                skipped = readings.len() - written,
                "expired readings purged"
            );
        }
        Ok(written)
    }

    async fn query(&self, query: &SensorQuery) -> Result<Vec<Reading>, StorageError> {
        if query.topics.is_empty() {
            return Ok(Vec::new());
        }

        let (clause, values) = Self::filter(query);
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT sensor_full_topic, timestamp, value FROM sensor_data
             WHERE {clause}
             ORDER BY timestamp, id"
        ))?;
        let readings = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_reading)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(readings)
    }

    async fn erase(&self, query: &SensorQuery) -> Result<usize, StorageError> {
        if query.topics.is_empty() {
            return Ok(0);
        }

        let (clause, values) = Self::filter(query);
        Ok(self.conn().execute(
            &format!("DELETE FROM sensor_data WHERE {clause}"),
            params_from_iter(values.iter()),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteSensorStore;
    use crate::storage::store::{SensorQuery, SensorStore};
    use chrono::{Duration, TimeZone, Utc};
    use telemetry_bus::Reading;

    fn temperature_query() -> SensorQuery {
        SensorQuery::new(vec!["gw1-temperature-0".to_string()])
    }

    #[tokio::test]
    async fn readings_round_trip_in_timestamp_order() {
        let store = SqliteSensorStore::open_in_memory().unwrap();
        store.ensure_indexes().await.unwrap();
        store.ensure_indexes().await.unwrap();

        let now = Utc::now();
        let base = Utc
            .timestamp_millis_opt(now.timestamp_millis())
            .unwrap();
        store
            .insert_batch(&[
                Reading::new("gw1-temperature-0", base, 25.5),
                Reading::new("gw1-temperature-0", base - Duration::seconds(5), 24.0),
                Reading::new("gw2-temperature-0", base, 30.0),
            ])
            .await
            .unwrap();

        let readings = store.query(&temperature_query()).await.unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].value, 24.0);
        assert_eq!(readings[1], Reading::new("gw1-temperature-0", base, 25.5));

        let windowed = temperature_query().between(Some(base), Some(base));
        assert_eq!(store.query(&windowed).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn erase_and_retention_delete_rows() {
        let store = SqliteSensorStore::open_in_memory()
            .unwrap()
            .with_retention(Duration::days(1));
        let now = Utc::now();
        let written = store
            .insert_batch(&[
                Reading::new("gw1-temperature-0", now - Duration::days(3), 1.0),
                Reading::new("gw1-temperature-0", now, 2.0),
                Reading::new("gw1-pressure-0", now, 3.0),
            ])
            .await
            .unwrap();
        assert_eq!(written, 2);

        assert_eq!(store.query(&temperature_query()).await.unwrap().len(), 1);
        assert_eq!(store.erase(&temperature_query()).await.unwrap(), 1);
        assert_eq!(store.purge_expired(now + Duration::days(2)).unwrap(), 1);
        assert!(store.query(&SensorQuery::new(Vec::new())).await.unwrap().is_empty());
    }
}
