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

//! Three-segment `gateway-topic-indicator` keys and wildcard matching.

use crate::error::BusError;
use std::fmt;
use std::str::FromStr;

/// Segment value that matches anything in the same position.
pub const WILDCARD: &str = "*";

/// Separator used when a key is rendered as a bus status name.
pub const SEGMENT_SEPARATOR: char = '-';

/// Suffix appended to the indicator for calibration statuses.
pub const CALIBRATE_SUFFIX: &str = "calibrate";

/// Gateway presence topic published by the ingestion layer.
pub const GATEWAY_STATUS_TOPIC: &str = "gateway-status-*";

/// Gateway presence topic republished by the gateway manager.
pub const GATEWAY_STATUS_UPDATE_TOPIC: &str = "gateway-statusupdate-*";

/// Alarm event topic.
pub const ALARM_NEW_EVENT_TOPIC: &str = "alarm-newevent-*";

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
/// Ordered `(gateway, topic, indicator)` triple.
///
/// Used both as a concrete status address and, when any segment is `*`, as a
/// subscription pattern.
pub struct TopicKey {
    gateway: String,
    topic: String,
    indicator: String,
}

impl TopicKey {
    pub fn new(
        gateway: impl Into<String>,
        topic: impl Into<String>,
        indicator: impl Into<String>,
    ) -> Self {
        Self {
            gateway: gateway.into(),
            topic: topic.into(),
            indicator: indicator.into(),
        }
    }

    /// Calibration variant of a sensor key: the indicator carries the `calibrate` suffix.
    pub fn calibration(
        gateway: impl Into<String>,
        topic: impl Into<String>,
        indicator: impl AsRef<str>,
    ) -> Self {
        Self::new(
            gateway,
            topic,
            format!("{}{CALIBRATE_SUFFIX}", indicator.as_ref()),
        )
    }

    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn indicator(&self) -> &str {
        &self.indicator
    }

    pub fn is_pattern(&self) -> bool {
        self.segments().iter().any(|segment| *segment == WILDCARD)
    }

    fn segments(&self) -> [&str; 3] {
        [&self.gateway, &self.topic, &self.indicator]
    }

    /// Returns `true` when `self`, read as a pattern, matches `published`.
    pub fn matches(&self, published: &TopicKey) -> bool {
        self.segments()
            .iter()
            .zip(published.segments().iter())
            .all(|(pattern, value)| *pattern == WILDCARD || pattern == value)
    }
}

/// String-level match used on the hot dispatch path.
///
/// Keys that do not split into exactly three segments never match.
pub fn pattern_matches(pattern: &str, published: &str) -> bool {
    let mut pattern_segments = pattern.split(SEGMENT_SEPARATOR);
    let mut published_segments = published.split(SEGMENT_SEPARATOR);

    for _ in 0..3 {
        match (pattern_segments.next(), published_segments.next()) {
            (Some(p), Some(v)) if p == WILDCARD || p == v => {}
            _ => return false,
        }
    }

    pattern_segments.next().is_none() && published_segments.next().is_none()
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEGMENT_SEPARATOR}{}{SEGMENT_SEPARATOR}{}",
            self.gateway, self.topic, self.indicator
        )
    }
}

impl FromStr for TopicKey {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split(SEGMENT_SEPARATOR).collect();
        match segments.as_slice() {
            [gateway, topic, indicator]
                if !gateway.is_empty() && !topic.is_empty() && !indicator.is_empty() =>
            {
                Ok(Self::new(*gateway, *topic, *indicator))
            }
            _ => Err(BusError::MalformedTopicKey(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{pattern_matches, TopicKey};
    use crate::error::BusError;

    #[test]
    fn wildcard_topic_segment_matches() {
        assert!(pattern_matches("gw1-*-temp", "gw1-sensor1-temp"));
    }

    #[test]
    fn literal_pattern_rejects_other_key() {
        assert!(!pattern_matches("gw1-sensor1-temp", "gw2-sensor2-humidity"));
    }

    #[test]
    fn every_position_accepts_wildcard() {
        assert!(pattern_matches("*-sensor1-temp", "gw9-sensor1-temp"));
        assert!(pattern_matches("gw1-sensor1-*", "gw1-sensor1-0"));
        assert!(pattern_matches("*-*-*", "gw1-sensor1-0"));
        assert!(!pattern_matches("*-sensor2-*", "gw1-sensor1-0"));
    }

    #[test]
    fn segment_count_mismatch_never_matches() {
        assert!(!pattern_matches("*-*", "gw1-sensor1"));
        assert!(!pattern_matches("*-*-*", "gw1-sensor1"));
        assert!(!pattern_matches("*-*-*", "gw1-sensor1-0-extra"));
    }

    #[test]
    fn typed_and_string_matching_agree() {
        let pattern: TopicKey = "gw1-*-temp".parse().unwrap();
        let published: TopicKey = "gw1-sensor1-temp".parse().unwrap();

        assert!(pattern.is_pattern());
        assert!(!published.is_pattern());
        assert_eq!(
            pattern.matches(&published),
            pattern_matches(&pattern.to_string(), &published.to_string())
        );
    }

    #[test]
    fn calibration_key_appends_suffix() {
        let key = TopicKey::calibration("gw1", "temperature", "0");
        assert_eq!(key.to_string(), "gw1-temperature-0calibrate");
    }

    #[test]
    fn parse_rejects_wrong_shape() {
        assert_eq!(
            "gw1-temperature".parse::<TopicKey>(),
            Err(BusError::MalformedTopicKey("gw1-temperature".to_string()))
        );
        assert!("gw1--0".parse::<TopicKey>().is_err());
    }
}
