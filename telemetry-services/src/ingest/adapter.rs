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

//! Ingestion adapter: wire loop, translation loop and outbound gateway commands.
//!
//! The wire loop runs on its own runtime thread and only pushes raw messages
//! into a bounded queue. A second thread drains that queue, translates and
//! publishes on the bus, so translation latency never stalls the wire.

use super::error::IngestError;
use super::translator::PayloadTranslator;
use super::wire::{WireMessage, WirePublisher, WireSession};
use crate::commands;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use telemetry_bus::observability::events;
use telemetry_bus::runtime::{spawn_runtime_thread, spawn_worker_thread};
use telemetry_bus::{ConsumerFacade, Replier};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "ingestion_adapter";
const WIRE_THREAD_NAME: &str = "tb-wire";
const TRANSLATE_THREAD_NAME: &str = "tb-translate";

const CALIBRATION_COMMAND_ID: u8 = 1;
const STATUS_REQUEST_COMMAND_ID: u8 = 2;
const BROADCAST_GATEWAY: &str = "all";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdapterState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(state)
    }
}

#[derive(Clone, Debug)]
pub struct IngestConfig {
    /// Prefix of inbound topics; the subscription filter is derived from it.
    pub inbound_prefix: String,
    /// Prefix of outbound gateway command topics.
    pub request_prefix: String,
    pub queue_capacity: usize,
    /// Delay before reconnecting after a lost connection; `None` stays disconnected.
    pub reconnect_delay: Option<Duration>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            inbound_prefix: "iocloud".to_string(),
            request_prefix: "iocloud/request".to_string(),
            queue_capacity: 1024,
            reconnect_delay: Some(Duration::from_secs(5)),
        }
    }
}

#[derive(Deserialize)]
struct CalibrationRequest {
    gateway: String,
    indicator: String,
    offset: f64,
    gain: f64,
}

type SharedState = Arc<Mutex<AdapterState>>;

fn set_state(state: &SharedState, next: AdapterState) {
    let mut current = state.lock().unwrap_or_else(PoisonError::into_inner);
    if *current != next {
        info!(
            event = events::INGEST_STATE_CHANGE,
            component = COMPONENT,
            from = %*current,
            to = %next,
            "ingestion state changed"
        );
        *current = next;
    }
}

pub struct IngestionAdapter {
    state: SharedState,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl IngestionAdapter {
    /// Registers the gateway command handlers on `facade` and starts the wire
    /// and translation threads.
    pub fn start(
        facade: Arc<ConsumerFacade>,
        config: IngestConfig,
        session: Box<dyn WireSession>,
        translator: Box<dyn PayloadTranslator>,
    ) -> Result<Arc<Self>, IngestError> {
        let state: SharedState = Arc::new(Mutex::new(AdapterState::Disconnected));
        let publisher = session.publisher();
        let filter = translator.inbound_filter(&config.inbound_prefix);

        register_gateway_commands(&facade, publisher, config.request_prefix.clone());

        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (stop_tx, stop_rx) = oneshot::channel();

        let translate_handle = spawn_worker_thread(TRANSLATE_THREAD_NAME.to_string(), {
            let facade = Arc::clone(&facade);
            move || translation_loop(facade, translator, queue_rx)
        })?;

        let wire_state = Arc::clone(&state);
        let reconnect_delay = config.reconnect_delay;
        let wire_handle = spawn_runtime_thread(WIRE_THREAD_NAME.to_string(), move || async move {
            wire_loop(session, filter, queue_tx, wire_state, stop_rx, reconnect_delay).await;
        })?;

        Ok(Arc::new(Self {
            state,
            stop: Mutex::new(Some(stop_tx)),
            threads: Mutex::new(vec![wire_handle, translate_handle]),
        }))
    }

    pub fn state(&self) -> AdapterState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Disconnects from the wire and waits for both threads to finish.
    pub fn stop(&self) {
        if let Some(stop) = self.stop.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = stop.send(());
        }

        let threads = std::mem::take(&mut *self.threads.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in threads {
            if handle.join().is_err() {
                error!(
                    event = events::INGEST_STATE_CHANGE,
                    component = COMPONENT,
                    "ingestion thread ended with a panic"
                );
            }
        }
    }
}

async fn wire_loop(
    mut session: Box<dyn WireSession>,
    filter: String,
    queue: mpsc::Sender<WireMessage>,
    state: SharedState,
    mut stop_rx: oneshot::Receiver<()>,
    reconnect_delay: Option<Duration>,
) {
    loop {
        set_state(&state, AdapterState::Connecting);
        let connected = tokio::select! {
            _ = &mut stop_rx => break,
            connected = connect(session.as_mut(), &filter) => connected,
        };

        if connected {
            set_state(&state, AdapterState::Connected);
            let stopped = receive_until_closed(session.as_mut(), &queue, &mut stop_rx).await;
            if let Err(err) = session.disconnect().await {
                debug!(component = COMPONENT, err = %err, "disconnect failed");
            }
            if stopped {
                break;
            }
        }

        set_state(&state, AdapterState::Disconnected);
        let Some(delay) = reconnect_delay else {
            break;
        };
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    set_state(&state, AdapterState::Disconnected);
}

async fn connect(session: &mut dyn WireSession, filter: &str) -> bool {
    let result = match session.connect().await {
        Ok(()) => session.subscribe(filter).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => {
            info!(
                event = events::INGEST_STATE_CHANGE,
                component = COMPONENT,
                filter,
                "subscribed to inbound filter"
            );
            true
        }
        Err(err) => {
            error!(
                event = events::INGEST_CONNECTION_FAILED,
                component = COMPONENT,
                err = %err,
                "unable to connect to the wire"
            );
            false
        }
    }
}

/// Pumps inbound messages into the queue. Returns `true` when stopped on request.
async fn receive_until_closed(
    session: &mut dyn WireSession,
    queue: &mpsc::Sender<WireMessage>,
    stop_rx: &mut oneshot::Receiver<()>,
) -> bool {
    loop {
        let next = tokio::select! {
            _ = &mut *stop_rx => return true,
            next = session.next_message() => next,
        };

        match next {
            Ok(Some(message)) => enqueue(queue, message),
            Ok(None) => {
                info!(
                    event = events::INGEST_STATE_CHANGE,
                    component = COMPONENT,
                    "wire closed by peer"
                );
                return false;
            }
            Err(err) => {
                error!(
                    event = events::INGEST_CONNECTION_FAILED,
                    component = COMPONENT,
                    err = %err,
                    "wire connection lost"
                );
                return false;
            }
        }
    }
}

fn enqueue(queue: &mpsc::Sender<WireMessage>, message: WireMessage) {
    debug!(
        event = events::INGEST_RECEIVE,
        component = COMPONENT,
        topic = message.topic.as_str(),
        bytes = message.payload.len(),
        "wire message received"
    );

    if let Err(err) = queue.try_send(message) {
        let message = match err {
            mpsc::error::TrySendError::Full(message) | mpsc::error::TrySendError::Closed(message) => message,
        };
        warn!(
            event = events::INGEST_QUEUE_FULL,
            component = COMPONENT,
            topic = message.topic.as_str(),
            "translation queue unavailable; dropping message"
        );
    }
}

fn translation_loop(
    facade: Arc<ConsumerFacade>,
    mut translator: Box<dyn PayloadTranslator>,
    mut queue: mpsc::Receiver<WireMessage>,
) {
    while let Some(message) = queue.blocking_recv() {
        match translator.translate(&message.topic, &message.payload) {
            Ok(items) => {
                for item in items {
                    let topic = item.bus_topic();
                    debug!(
                        event = events::INGEST_PUBLISH,
                        component = COMPONENT,
                        wire_topic = message.topic.as_str(),
                        bus_topic = topic.as_str(),
                        "publishing translated item"
                    );
                    facade.send_status(&topic, item.to_value());
                }
            }
            Err(err) => warn!(
                event = events::INGEST_TRANSLATE_FAILED,
                component = COMPONENT,
                wire_topic = message.topic.as_str(),
                err = %err,
                "dropping untranslatable message"
            ),
        }
    }
}

fn register_gateway_commands(
    facade: &ConsumerFacade,
    publisher: Arc<dyn WirePublisher>,
    request_prefix: String,
) {
    let calibration_publisher = Arc::clone(&publisher);
    let calibration_prefix = request_prefix.clone();
    facade.register_command_handler(commands::CALIBRATION, move |data, replier| {
        let outcome = calibration_command(calibration_publisher.as_ref(), &calibration_prefix, data);
        answer(commands::CALIBRATION, outcome, &replier);
    });

    facade.register_command_handler(commands::SYSTEM_STATUS_REQUEST, move |_, replier| {
        let topic = format!("{request_prefix}/{BROADCAST_GATEWAY}/command");
        let payload = json!({"command": STATUS_REQUEST_COMMAND_ID, "params": {}});
        let outcome = send_gateway_command(publisher.as_ref(), &topic, &payload);
        answer(commands::SYSTEM_STATUS_REQUEST, outcome, &replier);
    });
}

fn calibration_command(
    publisher: &dyn WirePublisher,
    request_prefix: &str,
    data: &Value,
) -> Result<(), String> {
    let request = CalibrationRequest::deserialize(data).map_err(|err| err.to_string())?;
    let sensor_id: u32 = request
        .indicator
        .parse()
        .map_err(|_| format!("indicator `{}` is not a sensor id", request.indicator))?;

    let topic = format!("{request_prefix}/{}/command", request.gateway);
    let payload = json!({
        "command": CALIBRATION_COMMAND_ID,
        "params": {
            "sensor_id": sensor_id,
            "offset": request.offset,
            "gain": request.gain,
        },
    });
    send_gateway_command(publisher, &topic, &payload)
}

fn send_gateway_command(
    publisher: &dyn WirePublisher,
    topic: &str,
    payload: &Value,
) -> Result<(), String> {
    if !publisher.is_connected() {
        return Err(IngestError::NotConnected.to_string());
    }
    let bytes = serde_json::to_vec(payload).map_err(|err| IngestError::from(err).to_string())?;
    publisher.publish(topic, bytes).map_err(|err| err.to_string())?;

    info!(
        event = events::INGEST_GATEWAY_COMMAND,
        component = COMPONENT,
        topic,
        "gateway command published"
    );
    Ok(())
}

fn answer(command: &str, outcome: Result<(), String>, replier: &Replier) {
    match outcome {
        Ok(()) => replier.reply(true, json!("success")),
        Err(message) => {
            warn!(
                event = events::INGEST_GATEWAY_COMMAND,
                component = COMPONENT,
                command,
                err = message.as_str(),
                "gateway command failed"
            );
            replier.reply(false, Value::String(message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{calibration_command, send_gateway_command};
    use crate::ingest::error::IngestError;
    use crate::ingest::wire::WirePublisher;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        connected: AtomicBool,
        sent: Mutex<Vec<(String, Value)>>,
    }

    impl WirePublisher for RecordingPublisher {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), IngestError> {
            let payload = serde_json::from_slice(&payload)?;
            self.sent.lock().unwrap().push((topic.to_string(), payload));
            Ok(())
        }
    }

    #[test]
    fn calibration_publishes_sensor_command() {
        let publisher = RecordingPublisher::default();
        publisher.connected.store(true, Ordering::SeqCst);

        calibration_command(
            &publisher,
            "iocloud/request",
            &json!({"gateway": "1C69", "indicator": "3", "offset": 0.5, "gain": 1.2}),
        )
        .expect("connected publisher");

        assert_eq!(
            *publisher.sent.lock().unwrap(),
            vec![(
                "iocloud/request/1C69/command".to_string(),
                json!({"command": 1, "params": {"sensor_id": 3, "offset": 0.5, "gain": 1.2}})
            )]
        );
    }

    #[test]
    fn commands_fail_while_disconnected() {
        let publisher = RecordingPublisher::default();

        let err = send_gateway_command(&publisher, "iocloud/request/all/command", &json!({}))
            .expect_err("disconnected");
        assert_eq!(err, "wire is not connected");
        assert!(publisher.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn calibration_rejects_non_numeric_indicator() {
        let publisher = RecordingPublisher::default();
        publisher.connected.store(true, Ordering::SeqCst);

        assert!(calibration_command(
            &publisher,
            "iocloud/request",
            &json!({"gateway": "1C69", "indicator": "x", "offset": 0.0, "gain": 1.0}),
        )
        .is_err());
    }
}
