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

use super::error::AlarmError;
use super::model::{Alarm, AlarmEvent};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Persistence of alarm definitions and the events they raised.
///
/// Implementations are synchronous and internally synchronized.
pub trait AlarmConfigStore: Send + Sync {
    fn load_alarms(&self) -> Result<Vec<Alarm>, AlarmError>;

    /// Stores a new alarm and returns the id assigned to it.
    fn add_alarm(&self, alarm: &Alarm) -> Result<i64, AlarmError>;

    /// Returns `false` when no alarm had that id.
    fn remove_alarm(&self, alarm_id: i64) -> Result<bool, AlarmError>;

    fn update_alarm(&self, alarm: &Alarm) -> Result<(), AlarmError>;

    fn add_events(&self, events: &[AlarmEvent]) -> Result<(), AlarmError>;

    /// Events, oldest first, optionally restricted to one alarm.
    fn events(&self, alarm_id: Option<i64>) -> Result<Vec<AlarmEvent>, AlarmError>;

    /// Deletes every event and returns how many were removed.
    fn remove_all_events(&self) -> Result<usize, AlarmError>;
}

#[derive(Default)]
struct MemoryState {
    next_alarm_id: i64,
    next_event_id: i64,
    alarms: BTreeMap<i64, Alarm>,
    events: Vec<AlarmEvent>,
}

/// Volatile alarm store for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryAlarmStore {
    state: Mutex<MemoryState>,
}

impl MemoryAlarmStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AlarmConfigStore for MemoryAlarmStore {
    fn load_alarms(&self) -> Result<Vec<Alarm>, AlarmError> {
        Ok(self.state().alarms.values().cloned().collect())
    }

    fn add_alarm(&self, alarm: &Alarm) -> Result<i64, AlarmError> {
        let mut state = self.state();
        state.next_alarm_id += 1;
        let id = state.next_alarm_id;

        let mut stored = alarm.clone();
        stored.id = id;
        state.alarms.insert(id, stored);
        Ok(id)
    }

    fn remove_alarm(&self, alarm_id: i64) -> Result<bool, AlarmError> {
        let mut state = self.state();
        let removed = state.alarms.remove(&alarm_id).is_some();
        if removed {
            state.events.retain(|event| event.alarm_id != alarm_id);
        }
        Ok(removed)
    }

    fn update_alarm(&self, alarm: &Alarm) -> Result<(), AlarmError> {
        let mut state = self.state();
        let stored = state
            .alarms
            .get_mut(&alarm.id)
            .ok_or(AlarmError::NotFound(alarm.id))?;
        *stored = alarm.clone();
        Ok(())
    }

    fn add_events(&self, events: &[AlarmEvent]) -> Result<(), AlarmError> {
        let mut state = self.state();
        for event in events {
            state.next_event_id += 1;
            let mut stored = event.clone();
            stored.id = state.next_event_id;
            state.events.push(stored);
        }
        Ok(())
    }

    fn events(&self, alarm_id: Option<i64>) -> Result<Vec<AlarmEvent>, AlarmError> {
        Ok(self
            .state()
            .events
            .iter()
            .filter(|event| alarm_id.map_or(true, |id| event.alarm_id == id))
            .cloned()
            .collect())
    }

    fn remove_all_events(&self) -> Result<usize, AlarmError> {
        let mut state = self.state();
        let removed = state.events.len();
        state.events.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::{AlarmConfigStore, MemoryAlarmStore};
    use crate::alarm::model::{Alarm, AlarmEvent, Comparison};
    use chrono::Utc;

    fn alarm(topic: &str) -> Alarm {
        Alarm {
            id: 0,
            name: "limit".to_string(),
            topic: topic.to_string(),
            threshold: 10.0,
            comparison: Comparison::Higher,
            panel_id: 1,
        }
    }

    #[test]
    fn ids_are_assigned_and_removal_cascades_to_events() {
        let store = MemoryAlarmStore::new();
        let first = store.add_alarm(&alarm("a-b-c")).unwrap();
        let second = store.add_alarm(&alarm("a-b-d")).unwrap();
        assert_ne!(first, second);

        let mut stored = store.load_alarms().unwrap();
        stored[0].threshold = 20.0;
        store
            .add_events(&[AlarmEvent::for_alarm(&stored[0], Utc::now(), 30.0)])
            .unwrap();

        assert!(store.remove_alarm(first).unwrap());
        assert!(!store.remove_alarm(first).unwrap());
        assert!(store.events(None).unwrap().is_empty());
    }

    #[test]
    fn remove_all_events_reports_count() {
        let store = MemoryAlarmStore::new();
        let id = store.add_alarm(&alarm("a-b-c")).unwrap();
        let mut stored = alarm("a-b-c");
        stored.id = id;
        store
            .add_events(&[
                AlarmEvent::for_alarm(&stored, Utc::now(), 11.0),
                AlarmEvent::for_alarm(&stored, Utc::now(), 12.0),
            ])
            .unwrap();

        assert_eq!(store.events(Some(id)).unwrap().len(), 2);
        assert_eq!(store.remove_all_events().unwrap(), 2);
        assert_eq!(store.remove_all_events().unwrap(), 0);
    }
}
