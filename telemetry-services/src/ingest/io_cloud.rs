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

//! io-cloud gateway scheme.
//!
//! Wire topics look like `prefix/response/<gateway>/<kind>/<action>`. A report
//! carries every sensor of the gateway in one message; the sensor type comes
//! from its unit and the indicator is the running index of that unit within
//! the message.

use super::error::TranslateError;
use super::translator::{decode_json, gateway_status, PayloadTranslator, Translated, WireAction, WIRE_SEPARATOR};
use crate::timestamp::parse_timestamp;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use telemetry_bus::observability::events;
use telemetry_bus::{CalibrationUpdate, Reading, TopicKey};
use tracing::warn;

const COMPONENT: &str = "io_cloud_translator";
const RESPONSE_SEGMENT: &str = "response";
const TOPIC_SEGMENTS: usize = 5;

/// Sensor type for a measurement unit, `None` for units the scheme does not know.
pub fn sensor_type_for_unit(unit: &str) -> Option<&'static str> {
    match unit {
        "°C" => Some("temperature"),
        "kPa" => Some("pressure"),
        "V" => Some("tension"),
        "A" => Some("current"),
        "W" | "kW" => Some("power"),
        "%" => Some("powerFactor"),
        _ => None,
    }
}

#[derive(Deserialize)]
struct SensorSample {
    value: f64,
    unit: String,
    #[serde(default = "active_by_default")]
    active: bool,
}

fn active_by_default() -> bool {
    true
}

#[derive(Deserialize)]
struct ReportMessage {
    timestamp: String,
    sensors: Vec<SensorSample>,
}

#[derive(Deserialize)]
struct CalibrationAnswer {
    sensor_id: u32,
    gain: f64,
    offset: f64,
    #[serde(default)]
    command_status: i64,
}

/// Canonical address of one physical sensor on a gateway.
#[derive(Clone, Debug, Eq, PartialEq)]
struct SensorSlot {
    sensor_type: &'static str,
    indicator: String,
}

/// Translator for io-cloud gateways.
///
/// Remembers, per gateway, which sensor type and indicator each sensor id
/// carried in the last report, so calibration answers that only name the
/// sensor id can be routed to the right `…calibrate` topic.
#[derive(Default)]
pub struct IoCloudTranslator {
    sensors: HashMap<String, HashMap<u32, SensorSlot>>,
}

impl IoCloudTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    fn translate_report(
        &mut self,
        topic: &str,
        gateway: &str,
        payload: &[u8],
    ) -> Result<Vec<Translated>, TranslateError> {
        let report: ReportMessage = decode_json(topic, payload)?;
        let timestamp = parse_timestamp(&report.timestamp)
            .ok_or_else(|| TranslateError::payload(topic, "invalid timestamp"))?;

        let mut unit_indexes: HashMap<&str, usize> = HashMap::new();
        let mut slots = HashMap::new();
        let mut readings = Vec::with_capacity(report.sensors.len());

        for (sensor_id, sample) in report.sensors.iter().enumerate() {
            let Some(sensor_type) = sensor_type_for_unit(&sample.unit) else {
                warn!(
                    event = events::INGEST_TRANSLATE_FAILED,
                    component = COMPONENT,
                    topic,
                    unit = sample.unit.as_str(),
                    "unit not recognized; skipping sensor"
                );
                continue;
            };

            let index = unit_indexes.entry(sample.unit.as_str()).or_insert(0);
            let indicator = index.to_string();
            *index += 1;

            if let Ok(sensor_id) = u32::try_from(sensor_id) {
                slots.insert(
                    sensor_id,
                    SensorSlot {
                        sensor_type,
                        indicator: indicator.clone(),
                    },
                );
            }

            if sample.active {
                let key = TopicKey::new(gateway, sensor_type, indicator);
                readings.push(Translated::Reading(Reading::new(
                    key.to_string(),
                    timestamp,
                    sample.value,
                )));
            }
        }

        self.sensors.insert(gateway.to_string(), slots);
        Ok(readings)
    }

    fn translate_calibration(
        &self,
        topic: &str,
        gateway: &str,
        payload: &[u8],
    ) -> Result<Vec<Translated>, TranslateError> {
        let answer: CalibrationAnswer = decode_json(topic, payload)?;
        if answer.command_status != 0 {
            return Err(TranslateError::payload(
                topic,
                format!("calibration rejected with status {}", answer.command_status),
            ));
        }

        let slot = self
            .sensors
            .get(gateway)
            .and_then(|slots| slots.get(&answer.sensor_id))
            .ok_or_else(|| {
                TranslateError::payload(
                    topic,
                    format!("sensor {} has not been reported yet", answer.sensor_id),
                )
            })?;

        Ok(vec![Translated::Calibration(CalibrationUpdate {
            full_topic: TopicKey::calibration(gateway, slot.sensor_type, &slot.indicator).to_string(),
            gain: answer.gain,
            offset: answer.offset,
        })])
    }
}

impl PayloadTranslator for IoCloudTranslator {
    fn inbound_filter(&self, prefix: &str) -> String {
        format!("{prefix}/{RESPONSE_SEGMENT}/#")
    }

    fn translate(&mut self, topic: &str, payload: &[u8]) -> Result<Vec<Translated>, TranslateError> {
        let segments: Vec<&str> = topic.split(WIRE_SEPARATOR).collect();
        if segments.len() != TOPIC_SEGMENTS {
            return Err(TranslateError::topic(
                topic,
                format!("expected {TOPIC_SEGMENTS} segments, found {}", segments.len()),
            ));
        }
        if segments[1] != RESPONSE_SEGMENT {
            return Err(TranslateError::topic(topic, "not a response topic"));
        }

        let gateway = segments[2];
        let action = WireAction::from_str(segments[4]).map_err(|()| {
            TranslateError::topic(topic, format!("unknown action `{}`", segments[4]))
        })?;

        match action {
            WireAction::Report => self.translate_report(topic, gateway, payload),
            WireAction::CalibrateResponse => self.translate_calibration(topic, gateway, payload),
            WireAction::Status => gateway_status(topic, gateway, payload)
                .map(|status| vec![Translated::GatewayStatus(status)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{sensor_type_for_unit, IoCloudTranslator};
    use crate::ingest::error::TranslateError;
    use crate::ingest::translator::{PayloadTranslator, Translated};

    const REPORT: &[u8] = "{\"timestamp\":\"2024-01-01T10:00:00\",\"sensors\":[\
        {\"value\":21.0,\"unit\":\"°C\"},\
        {\"value\":101.3,\"unit\":\"kPa\"},\
        {\"value\":22.5,\"unit\":\"°C\",\"active\":false},\
        {\"value\":1.0,\"unit\":\"lux\"}]}"
        .as_bytes();

    fn topics(items: &[Translated]) -> Vec<String> {
        items.iter().map(Translated::bus_topic).collect()
    }

    #[test]
    fn units_map_to_sensor_types() {
        assert_eq!(sensor_type_for_unit("V"), Some("tension"));
        assert_eq!(sensor_type_for_unit("kW"), Some("power"));
        assert_eq!(sensor_type_for_unit("lux"), None);
    }

    #[test]
    fn report_indexes_sensors_per_unit_and_skips_inactive() {
        let mut translator = IoCloudTranslator::new();
        let items = translator
            .translate("iocloud/response/1C69/sensor/report", REPORT)
            .expect("well-formed report");

        assert_eq!(
            topics(&items),
            vec!["1C69-temperature-0", "1C69-pressure-0"]
        );
    }

    #[test]
    fn calibration_answer_follows_reported_layout() {
        let mut translator = IoCloudTranslator::new();
        translator
            .translate("iocloud/response/1C69/sensor/report", REPORT)
            .unwrap();

        let items = translator
            .translate(
                "iocloud/response/1C69/sensor/calibrateresponse",
                br#"{"sensor_id":2,"gain":1.1,"offset":0.5,"command_status":0}"#,
            )
            .expect("known sensor");
        assert_eq!(topics(&items), vec!["1C69-temperature-1calibrate"]);
    }

    #[test]
    fn rejected_or_unknown_calibration_is_malformed_payload() {
        let mut translator = IoCloudTranslator::new();
        let unknown = translator
            .translate(
                "iocloud/response/1C69/sensor/calibrateresponse",
                br#"{"sensor_id":0,"gain":1.0,"offset":0.0,"command_status":0}"#,
            )
            .expect_err("nothing reported yet");
        assert!(matches!(unknown, TranslateError::MalformedPayload { .. }));

        translator
            .translate("iocloud/response/1C69/sensor/report", REPORT)
            .unwrap();
        let rejected = translator
            .translate(
                "iocloud/response/1C69/sensor/calibrateresponse",
                br#"{"sensor_id":0,"gain":1.0,"offset":0.0,"command_status":3}"#,
            )
            .expect_err("non-zero status");
        assert!(matches!(rejected, TranslateError::MalformedPayload { .. }));
    }

    #[test]
    fn topic_shape_is_validated() {
        let mut translator = IoCloudTranslator::new();
        for topic in [
            "iocloud/response/1C69/report",
            "iocloud/request/1C69/sensor/report",
            "iocloud/response/1C69/sensor/explode",
        ] {
            let err = translator.translate(topic, REPORT).expect_err(topic);
            assert!(matches!(err, TranslateError::MalformedTopic { .. }), "{topic}");
        }
    }
}
