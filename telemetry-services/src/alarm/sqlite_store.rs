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

//! SQLite-backed alarm configuration.
//!
//! ```sql
//! CREATE TABLE alarms (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     name TEXT NOT NULL,
//!     topic TEXT NOT NULL,
//!     threshold REAL NOT NULL,
//!     comparison TEXT NOT NULL,
//!     panel_id INTEGER NOT NULL
//! );
//! CREATE TABLE alarm_events (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     alarm_id INTEGER NOT NULL REFERENCES alarms (id) ON DELETE CASCADE,
//!     name TEXT NOT NULL,
//!     panel_id INTEGER NOT NULL,
//!     timestamp_ms INTEGER NOT NULL,
//!     value REAL NOT NULL
//! );
//! ```

use super::config_store::AlarmConfigStore;
use super::error::AlarmError;
use super::model::{Alarm, AlarmEvent, Comparison};
use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection, Row};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub struct SqliteAlarmStore {
    conn: Mutex<Connection>,
}

impl SqliteAlarmStore {
    pub fn open(path: &str) -> Result<Self, AlarmError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, AlarmError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, AlarmError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_schema(&self) -> Result<(), AlarmError> {
        let conn = self.conn();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE IF NOT EXISTS alarms (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 name TEXT NOT NULL,
                 topic TEXT NOT NULL,
                 threshold REAL NOT NULL,
                 comparison TEXT NOT NULL,
                 panel_id INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS alarm_events (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 alarm_id INTEGER NOT NULL REFERENCES alarms (id) ON DELETE CASCADE,
                 name TEXT NOT NULL,
                 panel_id INTEGER NOT NULL,
                 timestamp_ms INTEGER NOT NULL,
                 value REAL NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_alarm_events_alarm ON alarm_events (alarm_id);",
        )?;
        Ok(())
    }

    fn row_to_alarm(row: &Row) -> rusqlite::Result<Alarm> {
        let comparison: String = row.get(4)?;
        let comparison = Comparison::from_str(&comparison).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                err.into(),
            )
        })?;

        Ok(Alarm {
            id: row.get(0)?,
            name: row.get(1)?,
            topic: row.get(2)?,
            threshold: row.get(3)?,
            comparison,
            panel_id: row.get(5)?,
        })
    }

    fn row_to_event(row: &Row) -> rusqlite::Result<AlarmEvent> {
        let timestamp_ms: i64 = row.get(4)?;
        let timestamp = Utc
            .timestamp_millis_opt(timestamp_ms)
            .single()
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, timestamp_ms))?;

        Ok(AlarmEvent {
            id: row.get(0)?,
            alarm_id: row.get(1)?,
            name: row.get(2)?,
            panel_id: row.get(3)?,
            timestamp,
            value: row.get(5)?,
        })
    }
}

impl AlarmConfigStore for SqliteAlarmStore {
    fn load_alarms(&self) -> Result<Vec<Alarm>, AlarmError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, topic, threshold, comparison, panel_id FROM alarms ORDER BY id",
        )?;
        let alarms = stmt
            .query_map([], Self::row_to_alarm)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(alarms)
    }

    fn add_alarm(&self, alarm: &Alarm) -> Result<i64, AlarmError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO alarms (name, topic, threshold, comparison, panel_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                alarm.name,
                alarm.topic,
                alarm.threshold,
                alarm.comparison.as_str(),
                alarm.panel_id
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn remove_alarm(&self, alarm_id: i64) -> Result<bool, AlarmError> {
        let removed = self
            .conn()
            .execute("DELETE FROM alarms WHERE id = ?1", params![alarm_id])?;
        Ok(removed > 0)
    }

    fn update_alarm(&self, alarm: &Alarm) -> Result<(), AlarmError> {
        let updated = self.conn().execute(
            "UPDATE alarms SET name = ?2, topic = ?3, threshold = ?4, comparison = ?5, panel_id = ?6
             WHERE id = ?1",
            params![
                alarm.id,
                alarm.name,
                alarm.topic,
                alarm.threshold,
                alarm.comparison.as_str(),
                alarm.panel_id
            ],
        )?;
        if updated == 0 {
            return Err(AlarmError::NotFound(alarm.id));
        }
        Ok(())
    }

    fn add_events(&self, events: &[AlarmEvent]) -> Result<(), AlarmError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO alarm_events (alarm_id, name, panel_id, timestamp_ms, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for event in events {
                stmt.execute(params![
                    event.alarm_id,
                    event.name,
                    event.panel_id,
                    event.timestamp.timestamp_millis(),
                    event.value
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn events(&self, alarm_id: Option<i64>) -> Result<Vec<AlarmEvent>, AlarmError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, alarm_id, name, panel_id, timestamp_ms, value FROM alarm_events
             WHERE ?1 IS NULL OR alarm_id = ?1
             ORDER BY timestamp_ms, id",
        )?;
        let events = stmt
            .query_map(params![alarm_id], Self::row_to_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    fn remove_all_events(&self) -> Result<usize, AlarmError> {
        Ok(self.conn().execute("DELETE FROM alarm_events", [])?)
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteAlarmStore;
    use crate::alarm::config_store::AlarmConfigStore;
    use crate::alarm::error::AlarmError;
    use crate::alarm::model::{Alarm, AlarmEvent, Comparison};
    use chrono::{TimeZone, Utc};

    fn alarm() -> Alarm {
        Alarm {
            id: 0,
            name: "low pressure".to_string(),
            topic: "gw1-pressure-0".to_string(),
            threshold: 90.0,
            comparison: Comparison::Lower,
            panel_id: 7,
        }
    }

    #[test]
    fn alarms_round_trip_through_sqlite() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        let id = store.add_alarm(&alarm()).unwrap();

        let mut loaded = store.load_alarms().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, id);
        assert_eq!(loaded[0].comparison, Comparison::Lower);

        loaded[0].threshold = 85.0;
        store.update_alarm(&loaded[0]).unwrap();
        assert_eq!(store.load_alarms().unwrap()[0].threshold, 85.0);

        let mut missing = alarm();
        missing.id = 999;
        assert!(matches!(
            store.update_alarm(&missing),
            Err(AlarmError::NotFound(999))
        ));
    }

    #[test]
    fn events_cascade_with_their_alarm() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        let mut stored = alarm();
        stored.id = store.add_alarm(&stored).unwrap();

        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        store
            .add_events(&[AlarmEvent::for_alarm(&stored, at, 80.0)])
            .unwrap();

        let events = store.events(Some(stored.id)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, at);
        assert_eq!(events[0].value, 80.0);

        assert!(store.remove_alarm(stored.id).unwrap());
        assert!(store.events(None).unwrap().is_empty());
    }
}
