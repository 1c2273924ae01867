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

//! Derivation of synthetic statuses from raw ones.
//!
//! A [`DataConverter`] maps the `topic` segment of a status name to a
//! converter. Statuses whose topic has no entry pass through untouched. The
//! built-in table feeds `current` and `tension`/`voltage` readings into a
//! [`PowerReport`] that emits `power` and `powerFactor` readings for the same
//! gateway and indicator.

pub mod power_report;

pub use power_report::{PowerReport, PowerSample, Quantity, DEFAULT_POWER_FACTOR};

use crate::model::Reading;
use crate::topic_key::TopicKey;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

pub const POWER_TOPIC: &str = "power";
pub const POWER_FACTOR_TOPIC: &str = "powerFactor";

/// A status produced by a converter, dispatched like any published status.
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedStatus {
    pub name: String,
    pub data: Value,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ConverterKind {
    Power(Quantity),
}

/// Lookup table from status topic to converter, plus the converters' state.
pub struct DataConverter {
    table: HashMap<String, ConverterKind>,
    power: PowerReport,
}

impl Default for DataConverter {
    fn default() -> Self {
        let mut table = HashMap::new();
        table.insert("current".to_string(), ConverterKind::Power(Quantity::Current));
        table.insert("tension".to_string(), ConverterKind::Power(Quantity::Tension));
        table.insert("voltage".to_string(), ConverterKind::Power(Quantity::Tension));

        Self {
            table,
            power: PowerReport::default(),
        }
    }
}

impl DataConverter {
    /// Converter with an empty table: every status passes through.
    pub fn passthrough() -> Self {
        Self {
            table: HashMap::new(),
            power: PowerReport::default(),
        }
    }

    pub fn handles(&self, topic: &str) -> bool {
        self.table.contains_key(topic)
    }

    /// Derives zero or more statuses from `status_name` and its payload.
    pub fn convert(&mut self, status_name: &str, data: &Value) -> Vec<DerivedStatus> {
        let Ok(key) = TopicKey::from_str(status_name) else {
            return Vec::new();
        };
        let Some(kind) = self.table.get(key.topic()).copied() else {
            return Vec::new();
        };
        let Some(reading) = Reading::from_value(data) else {
            return Vec::new();
        };

        match kind {
            ConverterKind::Power(quantity) => self
                .power
                .record(key.gateway(), key.indicator(), quantity, reading.value)
                .map(|sample| power_statuses(&key, &reading, sample))
                .unwrap_or_default(),
        }
    }
}

fn power_statuses(key: &TopicKey, reading: &Reading, sample: PowerSample) -> Vec<DerivedStatus> {
    [
        (POWER_TOPIC, sample.power),
        (POWER_FACTOR_TOPIC, sample.power_factor),
    ]
    .into_iter()
    .map(|(topic, value)| {
        let name = TopicKey::new(key.gateway(), topic, key.indicator()).to_string();
        let data = Reading::new(name.clone(), reading.timestamp, value).to_value();
        DerivedStatus { name, data }
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::{DataConverter, DEFAULT_POWER_FACTOR};
    use crate::model::Reading;
    use chrono::Utc;
    use serde_json::json;

    fn reading(topic: &str, value: f64) -> serde_json::Value {
        Reading::new(topic, Utc::now(), value).to_value()
    }

    #[test]
    fn unknown_topics_pass_through() {
        let mut converter = DataConverter::default();
        assert!(converter
            .convert("gw1-temperature-0", &reading("gw1-temperature-0", 20.0))
            .is_empty());
    }

    #[test]
    fn current_and_voltage_yield_power_statuses() {
        let mut converter = DataConverter::default();

        assert!(converter
            .convert("gw1-current-0", &reading("gw1-current-0", 2.0))
            .is_empty());
        let derived = converter.convert("gw1-voltage-0", &reading("gw1-voltage-0", 220.0));

        assert_eq!(derived.len(), 2);
        assert_eq!(derived[0].name, "gw1-power-0");
        assert_eq!(derived[1].name, "gw1-powerFactor-0");

        let power = Reading::from_value(&derived[0].data).unwrap();
        assert_eq!(power.value, 440.0);
        assert_eq!(power.full_topic, "gw1-power-0");
        let factor = Reading::from_value(&derived[1].data).unwrap();
        assert_eq!(factor.value, DEFAULT_POWER_FACTOR);
    }

    #[test]
    fn non_reading_payloads_are_ignored() {
        let mut converter = DataConverter::default();
        assert!(converter
            .convert("gw1-current-0", &json!({"current": 2.0}))
            .is_empty());
    }

    #[test]
    fn passthrough_converter_never_derives() {
        let mut converter = DataConverter::passthrough();
        converter.convert("gw1-current-0", &reading("gw1-current-0", 2.0));
        assert!(converter
            .convert("gw1-tension-0", &reading("gw1-tension-0", 220.0))
            .is_empty());
        assert!(!converter.handles("current"));
    }
}
