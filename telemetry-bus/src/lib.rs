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

//! # telemetry-bus
//!
//! In-process message bus for gateway telemetry.
//!
//! Producers publish statuses on `gateway-topic-indicator` names and send
//! commands that are answered by request id. Every consumer attaches its own
//! queue through a [`ConsumerFacade`], which routes statuses to wildcard
//! subscribers, commands to registered handlers and answers to the callbacks
//! of the command that caused them.
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use telemetry_bus::{Bus, ConsumerFacade, InMemoryBus, Subscriber};
//!
//! let bus: Arc<dyn Bus> = Arc::new(InMemoryBus::new());
//! let facade = ConsumerFacade::new(bus.clone());
//! facade.add_subscription(
//!     Subscriber::new("printer", |update| println!("{} via {}", update.name, update.pattern)),
//!     "*-temperature-*",
//! );
//!
//! bus.publish("gw1-temperature-0", json!({"value": 21.5}));
//! assert_eq!(facade.drain_pending(), 1);
//! ```
//!
//! Internal modules are organized by concern:
//!
//! - [`bus`]: fan-out of envelopes to attached queues.
//! - [`consumer`]: the per-consumer facade and its indexes.
//! - [`converter`]: synthetic statuses derived from raw ones.
//! - [`runtime`]: dedicated thread and runtime helpers.
//! - [`observability`]: structured logging vocabulary.

pub mod bus;
pub mod consumer;
pub mod converter;
pub mod envelope;
pub mod error;
pub mod model;
pub mod observability;
pub mod runtime;
pub mod topic_key;

pub use bus::{Bus, BusReceiver, InMemoryBus};
pub use consumer::{
    AnswerCallback, CommandHandler, ConsumerFacade, FacadeConfig, Replier, StatusCallback,
    StatusUpdate, Subscriber,
};
pub use converter::DataConverter;
pub use envelope::{Envelope, RequestId};
pub use error::BusError;
pub use model::{CalibrationUpdate, GatewayStatus, Reading};
pub use topic_key::{pattern_matches, TopicKey};
