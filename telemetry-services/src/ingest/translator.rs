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

//! Translation of raw wire messages into canonical bus items.
//!
//! The direct scheme carries the canonical key in the wire topic itself:
//!
//! | action              | wire topic                                   | bus topic                           |
//! |---------------------|----------------------------------------------|-------------------------------------|
//! | `report`            | `prefix/gateway/report/topic/indicator`      | `gateway-topic-indicator`           |
//! | `calibrateresponse` | `prefix/gateway/calibrateresponse/topic/ind` | `gateway-topic-indcalibrate`        |
//! | `status`            | `prefix/gateway/status`                      | `gateway-status-*`                  |

use super::error::TranslateError;
use crate::timestamp::parse_timestamp;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use telemetry_bus::topic_key::GATEWAY_STATUS_TOPIC;
use telemetry_bus::{CalibrationUpdate, GatewayStatus, Reading, TopicKey};

pub const WIRE_SEPARATOR: char = '/';

/// Action segment of an inbound wire topic.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WireAction {
    Report,
    CalibrateResponse,
    Status,
}

impl WireAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::CalibrateResponse => "calibrateresponse",
            Self::Status => "status",
        }
    }
}

impl FromStr for WireAction {
    type Err = ();

    fn from_str(action: &str) -> Result<Self, Self::Err> {
        match action {
            "report" => Ok(Self::Report),
            "calibrateresponse" => Ok(Self::CalibrateResponse),
            "status" => Ok(Self::Status),
            _ => Err(()),
        }
    }
}

/// One canonical item decoded from a wire message.
#[derive(Clone, Debug, PartialEq)]
pub enum Translated {
    Reading(Reading),
    Calibration(CalibrationUpdate),
    GatewayStatus(GatewayStatus),
}

impl Translated {
    /// Bus topic the item is published on.
    pub fn bus_topic(&self) -> String {
        match self {
            Self::Reading(reading) => reading.full_topic.clone(),
            Self::Calibration(update) => update.full_topic.clone(),
            Self::GatewayStatus(_) => GATEWAY_STATUS_TOPIC.to_string(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Reading(reading) => reading.to_value(),
            Self::Calibration(update) => update.to_value(),
            Self::GatewayStatus(status) => status.to_value(),
        }
    }
}

/// Converts wire messages of one scheme into canonical items.
///
/// Translators may keep per-gateway state between messages, so they are
/// owned by exactly one translation loop.
pub trait PayloadTranslator: Send {
    /// Wire topic filter covering every message this scheme understands.
    fn inbound_filter(&self, prefix: &str) -> String {
        format!("{prefix}/#")
    }

    fn translate(&mut self, topic: &str, payload: &[u8]) -> Result<Vec<Translated>, TranslateError>;
}

#[derive(Deserialize)]
struct ReportPayload {
    value: f64,
    timestamp: String,
}

#[derive(Deserialize)]
struct CalibrationPayload {
    gain: f64,
    offset: f64,
}

#[derive(Deserialize)]
pub(crate) struct StatusPayload {
    #[serde(default)]
    pub(crate) name: Option<String>,
    pub(crate) ip: String,
    pub(crate) uptime: u64,
}

pub(crate) fn decode_json<T: for<'de> Deserialize<'de>>(
    topic: &str,
    payload: &[u8],
) -> Result<T, TranslateError> {
    serde_json::from_slice(payload).map_err(|err| TranslateError::payload(topic, err.to_string()))
}

pub(crate) fn gateway_status(
    topic: &str,
    gateway: &str,
    payload: &[u8],
) -> Result<GatewayStatus, TranslateError> {
    let raw: Value = decode_json(topic, payload)?;
    // Some firmwares nest the fields under a `gateway` object.
    let fields = raw.get("gateway").cloned().unwrap_or(raw);
    let status = StatusPayload::deserialize(fields)
        .map_err(|err| TranslateError::payload(topic, err.to_string()))?;

    Ok(GatewayStatus {
        name: status.name.unwrap_or_else(|| gateway.to_string()),
        ip: status.ip,
        uptime: status.uptime,
    })
}

/// Decodes a direct-scheme `report` message.
///
/// `topic_segments` is the wire topic split on `/`:
/// `[prefix, gateway, "report", topic, indicator]`.
pub fn translate_payload(topic_segments: &[&str], raw: &[u8]) -> Result<Reading, TranslateError> {
    let topic = topic_segments.join("/");
    let [_, gateway, action, sensor_topic, indicator] = topic_segments else {
        return Err(TranslateError::topic(
            &topic,
            format!("expected 5 segments, found {}", topic_segments.len()),
        ));
    };
    if WireAction::from_str(action) != Ok(WireAction::Report) {
        return Err(TranslateError::topic(&topic, "not a report"));
    }

    let payload: ReportPayload = decode_json(&topic, raw)?;
    let timestamp = parse_timestamp(&payload.timestamp)
        .ok_or_else(|| TranslateError::payload(&topic, "invalid timestamp"))?;

    let key = canonical_key(&topic, gateway, sensor_topic, indicator)?;
    Ok(Reading::new(key.to_string(), timestamp, payload.value))
}

fn canonical_key(
    topic: &str,
    gateway: &str,
    sensor_topic: &str,
    indicator: &str,
) -> Result<TopicKey, TranslateError> {
    TopicKey::from_str(&TopicKey::new(gateway, sensor_topic, indicator).to_string())
        .map_err(|err| TranslateError::topic(topic, err.to_string()))
}

/// Scheme whose wire topic embeds the canonical `gateway/topic/indicator` key.
#[derive(Debug, Default)]
pub struct DirectTranslator;

impl PayloadTranslator for DirectTranslator {
    fn translate(&mut self, topic: &str, payload: &[u8]) -> Result<Vec<Translated>, TranslateError> {
        let segments: Vec<&str> = topic.split(WIRE_SEPARATOR).collect();
        let action = segments
            .get(2)
            .ok_or_else(|| TranslateError::topic(topic, "missing action segment"))?;
        let action = WireAction::from_str(action)
            .map_err(|()| TranslateError::topic(topic, format!("unknown action `{action}`")))?;

        match action {
            WireAction::Report => {
                translate_payload(&segments, payload).map(|reading| vec![Translated::Reading(reading)])
            }
            WireAction::CalibrateResponse => {
                let [_, gateway, _, sensor_topic, indicator] = segments.as_slice() else {
                    return Err(TranslateError::topic(
                        topic,
                        format!("expected 5 segments, found {}", segments.len()),
                    ));
                };
                let calibration: CalibrationPayload = decode_json(topic, payload)?;
                canonical_key(topic, gateway, sensor_topic, indicator)?;

                Ok(vec![Translated::Calibration(CalibrationUpdate {
                    full_topic: TopicKey::calibration(*gateway, *sensor_topic, indicator).to_string(),
                    gain: calibration.gain,
                    offset: calibration.offset,
                })])
            }
            WireAction::Status => {
                let [_, gateway, _] = segments.as_slice() else {
                    return Err(TranslateError::topic(
                        topic,
                        format!("expected 3 segments, found {}", segments.len()),
                    ));
                };
                gateway_status(topic, gateway, payload)
                    .map(|status| vec![Translated::GatewayStatus(status)])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{translate_payload, DirectTranslator, PayloadTranslator, Translated};
    use crate::ingest::error::TranslateError;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    const REPORT: &[u8] = br#"{"value":25.5,"timestamp":"2024-01-01T10:00:00Z"}"#;

    #[test]
    fn report_translates_to_canonical_reading() {
        let reading = translate_payload(&["prefix", "gw1", "report", "temperature", "0"], REPORT)
            .expect("well-formed report");

        assert_eq!(reading.full_topic, "gw1-temperature-0");
        assert_eq!(reading.value, 25.5);
        assert_eq!(
            reading.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn wrong_segment_count_is_malformed_topic() {
        let err = translate_payload(&["prefix", "gw1", "report", "temperature"], REPORT)
            .expect_err("four segments");
        assert!(matches!(err, TranslateError::MalformedTopic { .. }));
    }

    #[test]
    fn missing_fields_are_malformed_payload() {
        let err = translate_payload(
            &["prefix", "gw1", "report", "temperature", "0"],
            br#"{"timestamp":"2024-01-01T10:00:00Z"}"#,
        )
        .expect_err("value missing");
        assert!(matches!(err, TranslateError::MalformedPayload { .. }));

        let err = translate_payload(&["prefix", "gw1", "report", "temperature", "0"], b"not json")
            .expect_err("not json");
        assert!(matches!(err, TranslateError::MalformedPayload { .. }));
    }

    #[test]
    fn unknown_action_is_malformed_topic() {
        let err = DirectTranslator
            .translate("prefix/gw1/reboot/temperature/0", REPORT)
            .expect_err("unknown action");
        assert!(matches!(err, TranslateError::MalformedTopic { .. }));
    }

    #[test]
    fn calibration_response_uses_calibrate_suffix() {
        let items = DirectTranslator
            .translate(
                "prefix/gw1/calibrateresponse/temperature/2",
                br#"{"gain":1.5,"offset":-0.25}"#,
            )
            .expect("well-formed calibration");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].bus_topic(), "gw1-temperature-2calibrate");
        assert_eq!(
            items[0].to_value(),
            json!({"fullTopic": "gw1-temperature-2calibrate", "gain": 1.5, "offset": -0.25})
        );
    }

    #[test]
    fn status_defaults_name_to_gateway_segment() {
        let items = DirectTranslator
            .translate("prefix/gw9/status", br#"{"ip":"10.0.0.9","uptime":42}"#)
            .expect("well-formed status");

        let [Translated::GatewayStatus(status)] = items.as_slice() else {
            panic!("expected one gateway status, got {items:?}");
        };
        assert_eq!(status.name, "gw9");
        assert_eq!(items[0].bus_topic(), "gateway-status-*");
    }
}
