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

//! # telemetry-services
//!
//! Services that sit on a [`telemetry_bus::ConsumerFacade`]:
//!
//! - [`ingest`]: MQTT wire session, payload translation and gateway commands.
//! - [`alarm`]: threshold rules evaluated against incoming readings.
//! - [`storage`]: write-behind persistence and queries of sensor readings.
//! - [`gateway`]: bounded map of the gateways seen on the bus.
//!
//! Every service registers its commands on the facade it is given and
//! answers them by request id.

pub mod alarm;
pub mod commands;
pub mod gateway;
pub mod ingest;
pub mod storage;
pub mod timestamp;

pub use alarm::{AlarmConfigStore, AlarmError, AlarmEvaluator, MemoryAlarmStore, SqliteAlarmStore};
pub use gateway::{GatewayManager, GatewayStatusMap};
pub use ingest::{IngestConfig, IngestError, IngestionAdapter, MqttSettings, MqttWire};
pub use storage::{
    AsyncBridge, MemorySensorStore, SensorQuery, SensorStore, SqliteSensorStore, StorageError,
    StorageSettings, StorageWriteQueue,
};
