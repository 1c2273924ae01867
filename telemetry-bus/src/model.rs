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

//! Canonical payloads carried on status envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One timestamped sensor value, addressed by its `gateway-topic-indicator` key.
pub struct Reading {
    pub full_topic: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Reading {
    pub fn new(full_topic: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            full_topic: full_topic.into(),
            timestamp,
            value,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Decodes a status payload; `None` when the payload is not a reading.
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Gain/offset pair reported by a gateway after a calibration command.
pub struct CalibrationUpdate {
    pub full_topic: String,
    pub gain: f64,
    pub offset: f64,
}

impl CalibrationUpdate {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// Presence information announced by a gateway.
pub struct GatewayStatus {
    pub name: String,
    pub ip: String,
    pub uptime: u64,
}

impl GatewayStatus {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::Reading;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn reading_uses_camel_case_and_rfc3339() {
        let reading = Reading::new(
            "gw1-temperature-0",
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            25.5,
        );

        assert_eq!(
            reading.to_value(),
            json!({
                "fullTopic": "gw1-temperature-0",
                "timestamp": "2024-01-01T10:00:00Z",
                "value": 25.5
            })
        );
    }

    #[test]
    fn non_reading_payload_is_rejected() {
        assert!(Reading::from_value(&json!({"gain": 1.0, "offset": 0.0})).is_none());
    }
}
