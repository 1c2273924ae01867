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

//! Process-wide fan-out of envelopes to every attached consumer queue.

use crate::envelope::{Envelope, RequestId};
use crate::observability::{events, fields};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};
use uuid::Uuid;

const COMPONENT: &str = "bus";

/// Receiving half of one consumer's queue.
pub type BusReceiver = UnboundedReceiver<Arc<Envelope>>;

/// Topic-addressed publish and command correlation shared by all consumers.
///
/// Every operation enqueues one envelope on every attached queue. Ordering is
/// FIFO within a queue; there is no ordering across queues.
pub trait Bus: Send + Sync {
    /// Registers a new queue that receives every envelope published afterwards.
    fn attach_consumer(&self) -> BusReceiver;

    /// Broadcasts a status envelope. A bus without consumers drops it.
    fn publish(&self, topic: &str, data: Value);

    /// Broadcasts a command and returns the fresh request id it carries.
    fn publish_command(&self, name: &str, data: Value) -> RequestId;

    /// Broadcasts the answer to `request_id`.
    fn publish_answer(&self, name: &str, result: bool, data: Value, request_id: RequestId);
}

/// Bus backed by one unbounded in-memory channel per consumer.
#[derive(Default)]
pub struct InMemoryBus {
    consumers: Mutex<Vec<UnboundedSender<Arc<Envelope>>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of consumer queues whose receiver is still alive.
    pub fn consumer_count(&self) -> usize {
        let consumers = self.consumers.lock().unwrap_or_else(PoisonError::into_inner);
        consumers.iter().filter(|sender| !sender.is_closed()).count()
    }

    fn deliver(&self, envelope: Envelope) {
        let envelope = Arc::new(envelope);
        let mut consumers = self.consumers.lock().unwrap_or_else(PoisonError::into_inner);

        if consumers.is_empty() {
            trace!(
                event = events::BUS_PUBLISH_NO_CONSUMERS,
                component = COMPONENT,
                name = envelope.name.as_str(),
                kind = fields::format_envelope_kind(&envelope),
                "no consumers attached; dropping envelope"
            );
            return;
        }

        let before = consumers.len();
        consumers.retain(|sender| sender.send(Arc::clone(&envelope)).is_ok());
        let pruned = before - consumers.len();

        if pruned > 0 {
            debug!(
                event = events::BUS_CONSUMER_PRUNED,
                component = COMPONENT,
                pruned,
                remaining = consumers.len(),
                "pruned closed consumer queues"
            );
        }
    }
}

impl Bus for InMemoryBus {
    fn attach_consumer(&self) -> BusReceiver {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut consumers = self.consumers.lock().unwrap_or_else(PoisonError::into_inner);
        consumers.push(sender);

        debug!(
            event = events::BUS_CONSUMER_ATTACHED,
            component = COMPONENT,
            consumers = consumers.len(),
            "attached consumer queue"
        );
        receiver
    }

    fn publish(&self, topic: &str, data: Value) {
        self.deliver(Envelope::status(topic, data));
    }

    fn publish_command(&self, name: &str, data: Value) -> RequestId {
        let request_id = Uuid::new_v4().to_string();
        self.deliver(Envelope::command(name, data, request_id.clone()));
        request_id
    }

    fn publish_answer(&self, name: &str, result: bool, data: Value, request_id: RequestId) {
        self.deliver(Envelope::answer(name, result, data, request_id));
    }
}

#[cfg(test)]
mod tests {
    use super::{Bus, InMemoryBus};
    use serde_json::json;

    #[test]
    fn publish_without_consumers_is_a_no_op() {
        let bus = InMemoryBus::new();
        bus.publish("gw1-temperature-0", json!({"value": 1.0}));
        let request_id = bus.publish_command("GET_ALARMS", json!({}));

        assert!(!request_id.is_empty());
        assert_eq!(bus.consumer_count(), 0);
    }

    #[test]
    fn every_consumer_receives_each_envelope_in_order() {
        let bus = InMemoryBus::new();
        let mut first = bus.attach_consumer();
        let mut second = bus.attach_consumer();

        bus.publish("gw1-temperature-0", json!(1));
        bus.publish("gw1-temperature-0", json!(2));

        for receiver in [&mut first, &mut second] {
            assert_eq!(receiver.try_recv().unwrap().data, json!(1));
            assert_eq!(receiver.try_recv().unwrap().data, json!(2));
            assert!(receiver.try_recv().is_err());
        }
    }

    #[test]
    fn consumers_attached_later_miss_earlier_envelopes() {
        let bus = InMemoryBus::new();
        let mut early = bus.attach_consumer();
        bus.publish("a-b-c", json!("before"));
        let mut late = bus.attach_consumer();
        bus.publish("a-b-c", json!("after"));

        assert_eq!(early.try_recv().unwrap().data, json!("before"));
        assert_eq!(late.try_recv().unwrap().data, json!("after"));
    }

    #[test]
    fn command_ids_are_unique_and_carried_on_the_envelope() {
        let bus = InMemoryBus::new();
        let mut receiver = bus.attach_consumer();

        let first = bus.publish_command("GET_ALARMS", json!({}));
        let second = bus.publish_command("GET_ALARMS", json!({}));
        assert_ne!(first, second);

        let envelope = receiver.try_recv().unwrap();
        assert!(envelope.is_command);
        assert_eq!(envelope.request_id.as_deref(), Some(first.as_str()));
        assert!(envelope.result.is_none());
    }

    #[test]
    fn dropped_receivers_are_pruned_on_publish() {
        let bus = InMemoryBus::new();
        let receiver = bus.attach_consumer();
        let _kept = bus.attach_consumer();
        drop(receiver);

        bus.publish("a-b-c", json!(null));
        assert_eq!(bus.consumer_count(), 1);
    }
}
