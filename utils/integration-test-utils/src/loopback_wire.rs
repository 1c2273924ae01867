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

//! In-process stand-in for an MQTT broker connection.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use telemetry_services::ingest::{IngestError, WireMessage, WirePublisher, WireSession};
use tokio::sync::mpsc;

#[derive(Default)]
struct Shared {
    connected: AtomicBool,
    broker_alive: AtomicBool,
    published: Mutex<Vec<WireMessage>>,
    filters: Mutex<Vec<String>>,
}

/// Session half handed to the ingestion adapter.
pub struct LoopbackWire {
    shared: Arc<Shared>,
    inbound: mpsc::UnboundedReceiver<WireMessage>,
}

/// Test half: injects inbound traffic and inspects outbound publishes.
pub struct LoopbackBroker {
    shared: Arc<Shared>,
    inbound: mpsc::UnboundedSender<WireMessage>,
}

struct LoopbackPublisher {
    shared: Arc<Shared>,
}

pub fn loopback_wire() -> (LoopbackWire, LoopbackBroker) {
    let shared = Arc::new(Shared::default());
    shared.broker_alive.store(true, Ordering::SeqCst);
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    (
        LoopbackWire {
            shared: Arc::clone(&shared),
            inbound: inbound_rx,
        },
        LoopbackBroker {
            shared,
            inbound: inbound_tx,
        },
    )
}

impl LoopbackBroker {
    /// Delivers a message as if a gateway had published it.
    pub fn inject(&self, topic: &str, payload: impl Into<Vec<u8>>) {
        let _ = self.inbound.send(WireMessage::new(topic, payload));
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Filters the session subscribed to, in order.
    pub fn filters(&self) -> Vec<String> {
        self.shared.filters.lock().unwrap().clone()
    }

    /// Messages published towards the gateways, in order.
    pub fn published(&self) -> Vec<WireMessage> {
        self.shared.published.lock().unwrap().clone()
    }
}

impl Drop for LoopbackBroker {
    fn drop(&mut self) {
        self.shared.broker_alive.store(false, Ordering::SeqCst);
    }
}

impl WirePublisher for LoopbackPublisher {
    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), IngestError> {
        if !self.is_connected() {
            return Err(IngestError::NotConnected);
        }
        self.shared
            .published
            .lock()
            .unwrap()
            .push(WireMessage::new(topic, payload));
        Ok(())
    }
}

#[async_trait]
impl WireSession for LoopbackWire {
    async fn connect(&mut self) -> Result<(), IngestError> {
        if !self.shared.broker_alive.load(Ordering::SeqCst) {
            return Err(IngestError::Connection("loopback broker is gone".to_string()));
        }
        self.shared.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&mut self, filter: &str) -> Result<(), IngestError> {
        self.shared.filters.lock().unwrap().push(filter.to_string());
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<WireMessage>, IngestError> {
        Ok(self.inbound.recv().await)
    }

    async fn disconnect(&mut self) -> Result<(), IngestError> {
        self.shared.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn publisher(&self) -> Arc<dyn WirePublisher> {
        Arc::new(LoopbackPublisher {
            shared: Arc::clone(&self.shared),
        })
    }
}
