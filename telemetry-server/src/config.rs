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

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub(crate) bus: BusConfig,
    pub(crate) mqtt: MqttConfig,
    #[serde(default)]
    pub(crate) storage: StorageConfig,
    #[serde(default)]
    pub(crate) alarms: AlarmsConfig,
    #[serde(default)]
    pub(crate) gateways: GatewaysConfig,
}

impl Config {
    /// Rejects values that parse but cannot run.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.storage.flush_interval_ms > 0,
            "storage.flush_interval_ms must be greater than zero"
        );
        ensure!(
            !self.storage.patterns.is_empty(),
            "storage.patterns must name at least one pattern"
        );
        ensure!(self.bus.request_ttl_secs > 0, "bus.request_ttl_secs must be greater than zero");
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct BusConfig {
    pub(crate) name: String,
    pub(crate) request_ttl_secs: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: "services".to_string(),
            request_ttl_secs: 60,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TranslatorScheme {
    #[default]
    IoCloud,
    Direct,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct MqttConfig {
    pub(crate) hostname: String,
    #[serde(default = "default_mqtt_port")]
    pub(crate) port: u16,
    #[serde(default = "default_client_id")]
    pub(crate) client_id: String,
    #[serde(default = "default_keep_alive_secs")]
    pub(crate) keep_alive_secs: u64,
    #[serde(default)]
    pub(crate) scheme: TranslatorScheme,
    #[serde(default = "default_inbound_prefix")]
    pub(crate) inbound_prefix: String,
    #[serde(default = "default_request_prefix")]
    pub(crate) request_prefix: String,
    #[serde(default = "default_ingest_queue_capacity")]
    pub(crate) queue_capacity: usize,
    /// `0` disables reconnection.
    #[serde(default = "default_reconnect_delay_secs")]
    pub(crate) reconnect_delay_secs: u64,
}

impl MqttConfig {
    pub fn reconnect_delay(&self) -> Option<Duration> {
        (self.reconnect_delay_secs > 0).then(|| Duration::from_secs(self.reconnect_delay_secs))
    }
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "telemetry-server".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_inbound_prefix() -> String {
    "iocloud".to_string()
}

fn default_request_prefix() -> String {
    "iocloud/request".to_string()
}

fn default_ingest_queue_capacity() -> usize {
    1024
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct StorageConfig {
    /// SQLite file; readings stay in memory when absent.
    pub(crate) database_path: Option<String>,
    pub(crate) flush_interval_ms: u64,
    pub(crate) retention_days: i64,
    pub(crate) patterns: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            flush_interval_ms: 1000,
            retention_days: 60,
            patterns: vec!["*-*-*".to_string()],
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct AlarmsConfig {
    /// SQLite file; alarms stay in memory when absent.
    pub(crate) database_path: Option<String>,
    pub(crate) queue_capacity: usize,
}

impl Default for AlarmsConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            queue_capacity: 4096,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct GatewaysConfig {
    pub(crate) capacity: usize,
}

impl Default for GatewaysConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, TranslatorScheme};

    #[test]
    fn only_the_mqtt_hostname_is_required() {
        let config: Config = json5::from_str("{ mqtt: { hostname: 'broker.local' } }").unwrap();

        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.scheme, TranslatorScheme::IoCloud);
        assert_eq!(config.storage.patterns, vec!["*-*-*"]);
        assert_eq!(config.gateways.capacity, 100);
        assert!(config.alarms.database_path.is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(json5::from_str::<Config>("{ mqtt: { hostname: 'h', qos: 2 } }").is_err());
        assert!(json5::from_str::<Config>("{ storage: {} }").is_err());
    }

    #[test]
    fn zero_flush_interval_fails_validation() {
        let config: Config = json5::from_str(
            "{ mqtt: { hostname: 'h' }, storage: { flush_interval_ms: 0 } }",
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("flush_interval_ms"));
    }

    #[test]
    fn bundled_sample_parses() {
        let sample = include_str!("../config/telemetry.json5");
        let config: Config = json5::from_str(sample).unwrap();
        config.validate().unwrap();
        assert_eq!(config.mqtt.reconnect_delay(), Some(std::time::Duration::from_secs(5)));
    }
}
