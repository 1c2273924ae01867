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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Comparison {
    Higher,
    Lower,
    Equal,
}

impl Comparison {
    /// `Equal` compares with exact floating-point equality.
    pub fn triggers(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Higher => value > threshold,
            Self::Lower => value < threshold,
            Self::Equal => value == threshold,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Higher => "Higher",
            Self::Lower => "Lower",
            Self::Equal => "Equal",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "Higher" => Ok(Self::Higher),
            "Lower" => Ok(Self::Lower),
            "Equal" => Ok(Self::Equal),
            other => Err(format!("unknown comparison `{other}`")),
        }
    }
}

/// Threshold rule on one status topic.
///
/// `id` is zero until the config store assigns one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub topic: String,
    pub threshold: f64,
    #[serde(rename = "type")]
    pub comparison: Comparison,
    #[serde(default)]
    pub panel_id: i64,
}

impl Alarm {
    pub fn triggers(&self, value: f64) -> bool {
        self.comparison.triggers(value, self.threshold)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// One threshold crossing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmEvent {
    #[serde(default)]
    pub id: i64,
    pub alarm_id: i64,
    pub name: String,
    pub panel_id: i64,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl AlarmEvent {
    pub fn for_alarm(alarm: &Alarm, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            id: 0,
            alarm_id: alarm.id,
            name: alarm.name.clone(),
            panel_id: alarm.panel_id,
            timestamp,
            value,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::{Alarm, Comparison};
    use serde_json::json;

    #[test]
    fn comparisons_follow_threshold_semantics() {
        assert!(Comparison::Higher.triggers(150.0, 100.0));
        assert!(!Comparison::Higher.triggers(50.0, 100.0));
        assert!(!Comparison::Higher.triggers(100.0, 100.0));

        assert!(Comparison::Lower.triggers(50.0, 100.0));
        assert!(!Comparison::Lower.triggers(150.0, 100.0));

        assert!(Comparison::Equal.triggers(100.0, 100.0));
        assert!(!Comparison::Equal.triggers(100.000_001, 100.0));
        assert!(!Comparison::Equal.triggers(99.0, 100.0));
    }

    #[test]
    fn alarm_decodes_without_id() {
        let alarm: Alarm = serde_json::from_value(json!({
            "name": "too hot",
            "topic": "gw1-temperature-0",
            "threshold": 80.0,
            "type": "Higher",
            "panelId": 3
        }))
        .expect("valid alarm");

        assert_eq!(alarm.id, 0);
        assert_eq!(alarm.comparison, Comparison::Higher);
        assert_eq!(alarm.to_value()["type"], json!("Higher"));
    }
}
