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

//! Write-behind persistence of sensor readings.
//!
//! Status callbacks only enqueue. A flush thread wakes on a fixed interval,
//! drains the queue into one batch and hands it to the storage bridge.
//! Reads and erasures also run on the bridge and answer through callbacks.

use super::async_bridge::AsyncBridge;
use super::error::StorageError;
use super::store::{SensorQuery, SensorStore};
use crate::commands;
use crate::timestamp::parse_timestamp;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use telemetry_bus::observability::events;
use telemetry_bus::runtime::spawn_runtime_thread;
use telemetry_bus::topic_key::pattern_matches;
use telemetry_bus::{ConsumerFacade, Reading, Replier, Subscriber, TopicKey};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "storage_write_queue";
const FLUSH_THREAD_NAME: &str = "tb-flush";
const SUBSCRIBER_ID: &str = "sensor-storage";

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
/// Every `gateway-topic-indicator` status.
pub const DEFAULT_STORAGE_PATTERN: &str = "*-*-*";

#[derive(Clone, Debug)]
pub struct StorageSettings {
    pub flush_interval: Duration,
    pub patterns: Vec<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            patterns: vec![DEFAULT_STORAGE_PATTERN.to_string()],
        }
    }
}

#[derive(Deserialize)]
struct SensorInfoKey {
    gateway: String,
    topic: String,
    indicator: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SensorInfoRequest {
    #[serde(default)]
    sensor_infos: Vec<SensorInfoKey>,
    begin_date: Option<String>,
    end_date: Option<String>,
    websocket_id: Option<Value>,
}

impl SensorInfoRequest {
    fn to_query(&self) -> Result<SensorQuery, StorageError> {
        let bound = |field: &str, raw: &Option<String>| {
            raw.as_deref()
                .map(|raw| {
                    parse_timestamp(raw).ok_or_else(|| {
                        StorageError::InvalidRequest(format!("unparseable {field} `{raw}`"))
                    })
                })
                .transpose()
        };

        let topics = self
            .sensor_infos
            .iter()
            .map(|key| TopicKey::new(&key.gateway, &key.topic, &key.indicator).to_string())
            .collect();
        Ok(SensorQuery::new(topics).between(
            bound("beginDate", &self.begin_date)?,
            bound("endDate", &self.end_date)?,
        ))
    }
}

struct FlushWorker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct StorageWriteQueue {
    facade: Arc<ConsumerFacade>,
    store: Arc<dyn SensorStore>,
    bridge: Arc<AsyncBridge>,
    settings: StorageSettings,
    /// Subscribed patterns in registration order.
    patterns: Arc<Mutex<Vec<String>>>,
    queue_tx: mpsc::UnboundedSender<Reading>,
    queue_rx: Mutex<mpsc::UnboundedReceiver<Reading>>,
    worker: Mutex<Option<FlushWorker>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StorageWriteQueue {
    /// Prepares the store indexes, subscribes to the configured patterns and
    /// registers the sensor info commands.
    pub fn new(
        facade: Arc<ConsumerFacade>,
        store: Arc<dyn SensorStore>,
        bridge: Arc<AsyncBridge>,
        settings: StorageSettings,
    ) -> Result<Arc<Self>, StorageError> {
        if settings.flush_interval.is_zero() {
            return Err(StorageError::InvalidRequest(
                "flush interval must be greater than zero".to_string(),
            ));
        }

        let indexed = Arc::clone(&store);
        bridge.run_blocking(async move { indexed.ensure_indexes().await })??;

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let queue = Arc::new(Self {
            facade,
            store,
            bridge,
            settings,
            patterns: Arc::new(Mutex::new(Vec::new())),
            queue_tx,
            queue_rx: Mutex::new(queue_rx),
            worker: Mutex::new(None),
        });

        for pattern in queue.settings.patterns.clone() {
            queue.add_subscription(&pattern);
        }
        queue.register_commands();
        Ok(queue)
    }

    /// Persists every Reading published under `pattern`.
    ///
    /// A status matched by several subscribed patterns is stored once, by the
    /// earliest registered pattern.
    pub fn add_subscription(&self, pattern: &str) {
        {
            let mut patterns = lock(&self.patterns);
            if !patterns.iter().any(|known| known == pattern) {
                patterns.push(pattern.to_string());
            }
        }

        let queue_tx = self.queue_tx.clone();
        let patterns = Arc::clone(&self.patterns);
        self.facade.add_subscription(
            Subscriber::new(SUBSCRIBER_ID, move |update| {
                if first_match(&lock(&patterns), update.name) != Some(update.pattern) {
                    return;
                }
                match Reading::from_value(update.data) {
                    Some(reading) => {
                        let _ = queue_tx.send(reading);
                    }
                    None => debug!(
                        event = events::STORAGE_PAYLOAD_IGNORED,
                        component = COMPONENT,
                        name = update.name,
                        "status is not a reading; not stored"
                    ),
                }
            }),
            pattern,
        );
    }

    pub fn remove_subscription(&self, pattern: &str) -> Result<(), StorageError> {
        self.facade.remove_subscription(SUBSCRIBER_ID, pattern)?;
        lock(&self.patterns).retain(|known| known != pattern);
        Ok(())
    }

    pub fn enqueue(&self, reading: Reading) {
        let _ = self.queue_tx.send(reading);
    }

    /// Hands everything queued to the bridge as one batch.
    /// Returns the batch size; zero means nothing was submitted.
    pub fn flush_pending(&self) -> usize {
        let batch: Vec<Reading> = {
            let mut queue = lock(&self.queue_rx);
            std::iter::from_fn(|| queue.try_recv().ok()).collect()
        };
        if batch.is_empty() {
            return 0;
        }

        let size = batch.len();
        let store = Arc::clone(&self.store);
        let submitted = self.bridge.submit(
            async move { store.insert_batch(&batch).await },
            move |outcome| match outcome {
                Ok(written) => debug!(
                    event = events::STORAGE_BATCH_FLUSH,
                    component = COMPONENT,
                    written,
                    "sensor batch written"
                ),
                Err(err) => error!(
                    event = events::STORAGE_BATCH_FAILED,
                    component = COMPONENT,
                    size,
                    err = %err,
                    "sensor batch lost"
                ),
            },
        );

        if let Err(err) = submitted {
            error!(
                event = events::STORAGE_BATCH_FAILED,
                component = COMPONENT,
                size,
                err = %err,
                "sensor batch lost"
            );
            return 0;
        }
        size
    }

    /// Spawns the flush thread. Calling it again while running is a no-op.
    pub fn start(self: &Arc<Self>) -> Result<(), StorageError> {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            return Ok(());
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let queue = Arc::clone(self);
        let interval = self.settings.flush_interval;
        let handle = spawn_runtime_thread(FLUSH_THREAD_NAME.to_string(), move || async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        queue.flush_pending();
                    }
                }
            }
            queue.flush_pending();
        })?;

        info!(
            component = COMPONENT,
            flush_interval_ms = interval.as_millis() as u64,
            patterns = ?self.settings.patterns,
            "sensor storage started"
        );
        *worker = Some(FlushWorker {
            stop: stop_tx,
            handle,
        });
        Ok(())
    }

    /// Stops the flush thread after a final flush.
    pub fn stop(&self) {
        let Some(worker) = lock(&self.worker).take() else {
            return;
        };
        let _ = worker.stop.send(());
        if worker.handle.join().is_err() {
            error!(component = COMPONENT, "flush thread ended with a panic");
        }
    }

    /// Writes `readings` immediately, bypassing the queue.
    pub fn add_sensor_info<C>(&self, readings: Vec<Reading>, on_done: C) -> Result<(), StorageError>
    where
        C: FnOnce(bool, Value) + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        self.bridge.submit(
            async move { store.insert_batch(&readings).await },
            move |outcome| match outcome {
                Ok(written) => on_done(true, json!(written)),
                Err(err) => on_done(false, Value::String(err.to_string())),
            },
        )
    }

    /// Answers `{"info": {fullTopic: [{timestamp, value}, ...]}}` with each
    /// list in timestamp order. A failed query answers `false` with an empty
    /// `info` object.
    pub fn read_sensor_info<C>(&self, query: SensorQuery, on_done: C) -> Result<(), StorageError>
    where
        C: FnOnce(bool, Value) + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        self.bridge.submit(
            async move { store.query(&query).await },
            move |outcome| match outcome {
                Ok(readings) => on_done(true, group_by_topic(readings)),
                Err(err) => {
                    error!(
                        event = events::STORAGE_QUERY_FAILED,
                        component = COMPONENT,
                        err = %err,
                        "sensor query failed"
                    );
                    on_done(false, json!({ "info": {} }));
                }
            },
        )
    }

    pub fn erase_sensor_info<C>(&self, query: SensorQuery, on_done: C) -> Result<(), StorageError>
    where
        C: FnOnce(bool, Value) + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        self.bridge.submit(
            async move { store.erase(&query).await },
            move |outcome| match outcome {
                Ok(erased) => on_done(true, Value::String(format!("{erased} readings erased"))),
                Err(err) => {
                    error!(
                        event = events::STORAGE_QUERY_FAILED,
                        component = COMPONENT,
                        err = %err,
                        "sensor erase failed"
                    );
                    on_done(false, Value::String(err.to_string()));
                }
            },
        )
    }

    fn register_commands(self: &Arc<Self>) {
        let queue = Arc::downgrade(self);
        self.facade
            .register_command_handler(commands::ADD_SENSOR_INFO, move |data, replier| {
                let Some(queue) = queue.upgrade() else {
                    return;
                };
                let submitted = decode_readings(data).and_then(|readings| {
                    let answer = replier.clone();
                    queue.add_sensor_info(readings, move |result, data| answer.reply(result, data))
                });
                reject_on_error(commands::ADD_SENSOR_INFO, submitted, &replier);
            });

        let queue = Arc::downgrade(self);
        self.facade
            .register_command_handler(commands::READ_SENSOR_INFO, move |data, replier| {
                let Some(queue) = queue.upgrade() else {
                    return;
                };
                let submitted = serde_json::from_value::<SensorInfoRequest>(data.clone())
                    .map_err(StorageError::from)
                    .and_then(|request| {
                        let query = request.to_query()?;
                        let websocket_id = request.websocket_id;
                        let answer = replier.clone();
                        queue.read_sensor_info(query, move |result, mut data| {
                            if let (Some(id), Some(out)) = (websocket_id, data.as_object_mut()) {
                                out.insert("requestId".to_string(), id);
                            }
                            answer.reply(result, data);
                        })
                    });
                reject_on_error(commands::READ_SENSOR_INFO, submitted, &replier);
            });

        let queue = Arc::downgrade(self);
        self.facade
            .register_command_handler(commands::ERASE_SENSOR_INFO, move |data, replier| {
                let Some(queue) = queue.upgrade() else {
                    return;
                };
                let submitted = serde_json::from_value::<SensorInfoRequest>(data.clone())
                    .map_err(StorageError::from)
                    .and_then(|request| request.to_query())
                    .and_then(|query| {
                        let answer = replier.clone();
                        queue.erase_sensor_info(query, move |result, data| {
                            answer.reply(result, data)
                        })
                    });
                reject_on_error(commands::ERASE_SENSOR_INFO, submitted, &replier);
            });
    }
}

fn first_match<'a>(patterns: &'a [String], name: &str) -> Option<&'a str> {
    patterns
        .iter()
        .map(String::as_str)
        .find(|pattern| pattern_matches(pattern, name))
}

fn group_by_topic(readings: Vec<Reading>) -> Value {
    let mut info = Map::new();
    for reading in readings {
        let entry = info
            .entry(reading.full_topic)
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(samples) = entry {
            samples.push(json!({ "timestamp": reading.timestamp, "value": reading.value }));
        }
    }
    json!({ "info": info })
}

/// Accepts one Reading or an array of them.
fn decode_readings(data: &Value) -> Result<Vec<Reading>, StorageError> {
    match data {
        Value::Array(_) => Ok(Vec::<Reading>::deserialize(data)?),
        _ => Ok(vec![Reading::deserialize(data)?]),
    }
}

fn reject_on_error(command: &str, submitted: Result<(), StorageError>, replier: &Replier) {
    if let Err(err) = submitted {
        warn!(
            component = COMPONENT,
            command,
            err = %err,
            "storage command rejected"
        );
        replier.reply(false, Value::String(err.to_string()));
    }
}
