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

//! Wire transport seam and its MQTT implementation.

use super::error::IngestError;
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use telemetry_bus::observability::events;
use tracing::{debug, info};

const COMPONENT: &str = "mqtt_wire";
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// One raw inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl WireMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Outbound half of a wire connection, usable from any thread.
pub trait WirePublisher: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Queues `payload` for `topic` without blocking the caller.
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), IngestError>;
}

/// Inbound half of a wire connection, driven by the adapter's wire loop.
#[async_trait]
pub trait WireSession: Send {
    async fn connect(&mut self) -> Result<(), IngestError>;

    async fn subscribe(&mut self, filter: &str) -> Result<(), IngestError>;

    /// Next inbound message; `Ok(None)` when the peer closed the connection.
    async fn next_message(&mut self) -> Result<Option<WireMessage>, IngestError>;

    async fn disconnect(&mut self) -> Result<(), IngestError>;

    fn publisher(&self) -> Arc<dyn WirePublisher>;
}

#[derive(Clone, Debug)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
}

#[derive(Default)]
struct MqttPublisher {
    client: Mutex<Option<AsyncClient>>,
    connected: AtomicBool,
}

impl MqttPublisher {
    fn client(&self) -> Option<AsyncClient> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_client(&self, client: Option<AsyncClient>) {
        *self.client.lock().unwrap_or_else(PoisonError::into_inner) = client;
    }
}

impl WirePublisher for MqttPublisher {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), IngestError> {
        if !self.is_connected() {
            return Err(IngestError::NotConnected);
        }
        let client = self.client().ok_or(IngestError::NotConnected)?;
        client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|err| IngestError::Publish {
                topic: topic.to_string(),
                reason: err.to_string(),
            })
    }
}

/// MQTT session backed by `rumqttc`.
pub struct MqttWire {
    settings: MqttSettings,
    event_loop: Option<EventLoop>,
    publisher: Arc<MqttPublisher>,
}

impl MqttWire {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            event_loop: None,
            publisher: Arc::new(MqttPublisher::default()),
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.settings.client_id.clone(),
            self.settings.host.clone(),
            self.settings.port,
        );
        options.set_keep_alive(self.settings.keep_alive);
        options
    }

    fn connection_lost(&mut self, err: ConnectionError) -> IngestError {
        self.publisher.connected.store(false, Ordering::SeqCst);
        self.event_loop = None;
        IngestError::Connection(err.to_string())
    }
}

#[async_trait]
impl WireSession for MqttWire {
    async fn connect(&mut self) -> Result<(), IngestError> {
        let (client, mut event_loop) = AsyncClient::new(self.options(), REQUEST_CHANNEL_CAPACITY);

        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!(
                        event = events::INGEST_STATE_CHANGE,
                        component = COMPONENT,
                        host = self.settings.host.as_str(),
                        port = self.settings.port,
                        code = ?ack.code,
                        "connected to broker"
                    );
                    break;
                }
                Ok(_) => continue,
                Err(err) => return Err(IngestError::Connection(err.to_string())),
            }
        }

        self.publisher.set_client(Some(client));
        self.publisher.connected.store(true, Ordering::SeqCst);
        self.event_loop = Some(event_loop);
        Ok(())
    }

    async fn subscribe(&mut self, filter: &str) -> Result<(), IngestError> {
        let client = self.publisher.client().ok_or(IngestError::NotConnected)?;
        client
            .subscribe(filter, QoS::AtLeastOnce)
            .await
            .map_err(|err| IngestError::Connection(err.to_string()))
    }

    async fn next_message(&mut self) -> Result<Option<WireMessage>, IngestError> {
        loop {
            let event_loop = self.event_loop.as_mut().ok_or(IngestError::NotConnected)?;
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(Some(WireMessage::new(publish.topic, publish.payload.to_vec())));
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.publisher.connected.store(false, Ordering::SeqCst);
                    return Ok(None);
                }
                Ok(_) => continue,
                Err(err) => return Err(self.connection_lost(err)),
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), IngestError> {
        self.publisher.connected.store(false, Ordering::SeqCst);
        let client = self.publisher.client();
        self.publisher.set_client(None);
        self.event_loop = None;

        if let Some(client) = client {
            // The broker may already be gone; there is nothing left to release then.
            if let Err(err) = client.disconnect().await {
                debug!(
                    event = events::INGEST_STATE_CHANGE,
                    component = COMPONENT,
                    err = %err,
                    "disconnect request not delivered"
                );
            }
        }
        Ok(())
    }

    fn publisher(&self) -> Arc<dyn WirePublisher> {
        self.publisher.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{MqttSettings, MqttWire, WirePublisher, WireSession};
    use crate::ingest::error::IngestError;
    use std::time::Duration;

    #[test]
    fn publisher_refuses_before_connect() {
        let wire = MqttWire::new(MqttSettings {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "test".to_string(),
            keep_alive: Duration::from_secs(30),
        });

        let publisher = wire.publisher();
        assert!(!publisher.is_connected());
        assert!(matches!(
            publisher.publish("iocloud/request/all/command", b"{}".to_vec()),
            Err(IngestError::NotConnected)
        ));
    }
}
