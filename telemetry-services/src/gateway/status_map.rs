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

use indexmap::IndexMap;
use telemetry_bus::GatewayStatus;

pub const DEFAULT_GATEWAY_CAPACITY: usize = 100;

/// Latest status per gateway name, in first-seen order.
///
/// Updating a known gateway keeps its position. Inserting a new gateway into
/// a full map evicts the oldest entry.
#[derive(Debug)]
pub struct GatewayStatusMap {
    capacity: usize,
    entries: IndexMap<String, GatewayStatus>,
}

impl Default for GatewayStatusMap {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_GATEWAY_CAPACITY)
    }
}

impl GatewayStatusMap {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: IndexMap::with_capacity(capacity),
        }
    }

    /// Stores `status` and returns the entry evicted to make room, if any.
    pub fn insert(&mut self, status: GatewayStatus) -> Option<GatewayStatus> {
        if let Some(current) = self.entries.get_mut(&status.name) {
            *current = status;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0).map(|(_, oldest)| oldest)
        } else {
            None
        };
        self.entries.insert(status.name.clone(), status);
        evicted
    }

    pub fn get(&self, name: &str) -> Option<&GatewayStatus> {
        self.entries.get(name)
    }

    pub fn statuses(&self) -> Vec<GatewayStatus> {
        self.entries.values().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{GatewayStatusMap, DEFAULT_GATEWAY_CAPACITY};
    use telemetry_bus::GatewayStatus;

    fn status(name: &str, uptime: u64) -> GatewayStatus {
        GatewayStatus {
            name: name.to_string(),
            ip: "10.0.0.1".to_string(),
            uptime,
        }
    }

    #[test]
    fn oldest_gateway_is_evicted_past_capacity() {
        let mut map = GatewayStatusMap::default();
        for index in 0..105 {
            map.insert(status(&format!("gateway-{index}"), index));
        }

        assert_eq!(map.len(), DEFAULT_GATEWAY_CAPACITY);
        assert!(map.get("gateway-0").is_none());
        assert!(map.get("gateway-4").is_none());
        assert!(map.get("gateway-5").is_some());
        assert!(map.get("gateway-104").is_some());
    }

    #[test]
    fn updates_keep_position_and_do_not_evict() {
        let mut map = GatewayStatusMap::with_capacity(2);
        map.insert(status("a", 1));
        map.insert(status("b", 1));

        assert!(map.insert(status("a", 2)).is_none());
        let names: Vec<String> = map.statuses().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(map.get("a").map(|s| s.uptime), Some(2));

        let evicted = map.insert(status("c", 1));
        assert_eq!(evicted.map(|s| s.name), Some("a".to_string()));
    }
}
