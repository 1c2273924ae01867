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

//! Per-consumer view of the bus.
//!
//! A [`ConsumerFacade`] owns one attached queue and multiplexes it to:
//!
//! - status subscribers, indexed by wildcard pattern;
//! - command handlers, keyed by command name;
//! - pending answer callbacks, keyed by request id.
//!
//! The queue is drained either on a dedicated thread ([`ConsumerFacade::start`])
//! or on the caller's thread ([`ConsumerFacade::drain_pending`]). Callbacks are
//! always invoked after the facade locks are released, so they may subscribe,
//! unsubscribe or send commands on the same facade.

mod pending;
mod subscriber;
mod subscription_index;

pub use pending::AnswerCallback;
pub use subscriber::{StatusCallback, StatusUpdate, Subscriber};

use crate::bus::{Bus, BusReceiver};
use crate::converter::DataConverter;
use crate::envelope::{Envelope, RequestId};
use crate::error::BusError;
use crate::observability::{events, fields};
use crate::runtime::{build_thread_name, spawn_runtime_thread};
use pending::PendingTable;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::iter;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use subscription_index::SubscriptionIndex;
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

const COMPONENT: &str = "consumer_facade";
const DRAIN_THREAD_NAME_PREFIX: &str = "tb-";

pub const DEFAULT_REQUEST_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Handler for one command name. It answers through the [`Replier`], now or later.
pub type CommandHandler = Arc<dyn Fn(&Value, Replier) + Send + Sync>;

#[derive(Clone, Debug)]
pub struct FacadeConfig {
    /// Used in logs and as the drain thread name suffix.
    pub name: String,
    /// Pending requests older than this are failed with [`BusError::RequestTimedOut`].
    pub request_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            name: "consumer".to_string(),
            request_ttl: DEFAULT_REQUEST_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl FacadeConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Owned handle answering one command request.
#[derive(Clone)]
pub struct Replier {
    bus: Arc<dyn Bus>,
    request_id: RequestId,
}

impl Replier {
    pub fn new(bus: Arc<dyn Bus>, request_id: RequestId) -> Self {
        Self { bus, request_id }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn reply(&self, result: bool, data: Value) {
        self.bus
            .publish_answer("", result, data, self.request_id.clone());
    }
}

struct FacadeState {
    index: SubscriptionIndex,
    pending: PendingTable,
}

struct DrainWorker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct ConsumerFacade {
    config: FacadeConfig,
    bus: Arc<dyn Bus>,
    state: Mutex<FacadeState>,
    handlers: Mutex<HashMap<String, CommandHandler>>,
    converter: Mutex<DataConverter>,
    receiver: Mutex<Option<BusReceiver>>,
    worker: Mutex<Option<DrainWorker>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl ConsumerFacade {
    /// Attaches a new queue to `bus` with default settings and the built-in converter table.
    pub fn new(bus: Arc<dyn Bus>) -> Arc<Self> {
        Self::with_config(bus, FacadeConfig::default(), DataConverter::default())
    }

    pub fn with_config(
        bus: Arc<dyn Bus>,
        config: FacadeConfig,
        converter: DataConverter,
    ) -> Arc<Self> {
        let receiver = bus.attach_consumer();
        let pending = PendingTable::new(config.request_ttl);

        Arc::new(Self {
            config,
            bus,
            state: Mutex::new(FacadeState {
                index: SubscriptionIndex::default(),
                pending,
            }),
            handlers: Mutex::new(HashMap::new()),
            converter: Mutex::new(converter),
            receiver: Mutex::new(Some(receiver)),
            worker: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn bus(&self) -> Arc<dyn Bus> {
        Arc::clone(&self.bus)
    }

    // Subscriptions

    /// Subscribes `subscriber` to `pattern`. A subscriber with the same id is replaced.
    pub fn add_subscription(&self, subscriber: Subscriber, pattern: &str) {
        debug!(
            event = events::FACADE_SUBSCRIBE,
            component = COMPONENT,
            facade = self.config.name.as_str(),
            subscriber_id = subscriber.id(),
            pattern,
            "adding subscription"
        );
        lock(&self.state).index.insert(pattern, subscriber);
    }

    pub fn remove_subscription(&self, subscriber_id: &str, pattern: &str) -> Result<(), BusError> {
        let result = lock(&self.state).index.remove(pattern, subscriber_id);
        self.log_unsubscribe(subscriber_id, pattern, &result);
        result
    }

    /// Adds one owner to a shared subscription. Returns the owner count.
    pub fn retain_subscription(&self, subscriber: Subscriber, pattern: &str) -> usize {
        let owners = lock(&self.state).index.retain(pattern, subscriber.clone());
        debug!(
            event = events::FACADE_SUBSCRIBE,
            component = COMPONENT,
            facade = self.config.name.as_str(),
            subscriber_id = subscriber.id(),
            pattern,
            owners,
            "retained subscription"
        );
        owners
    }

    /// Drops one owner of a shared subscription; it is removed at zero owners.
    pub fn release_subscription(
        &self,
        subscriber_id: &str,
        pattern: &str,
    ) -> Result<usize, BusError> {
        let result = lock(&self.state).index.release(pattern, subscriber_id);
        self.log_unsubscribe(subscriber_id, pattern, &result);
        result
    }

    pub fn is_subscribed(&self, subscriber_id: &str, pattern: &str) -> bool {
        lock(&self.state).index.contains(pattern, subscriber_id)
    }

    fn log_unsubscribe<T>(&self, subscriber_id: &str, pattern: &str, result: &Result<T, BusError>) {
        match result {
            Ok(_) => debug!(
                event = events::FACADE_UNSUBSCRIBE,
                component = COMPONENT,
                facade = self.config.name.as_str(),
                subscriber_id,
                pattern,
                "removed subscription"
            ),
            Err(err) => info!(
                event = events::FACADE_UNSUBSCRIBE_NOT_FOUND,
                component = COMPONENT,
                facade = self.config.name.as_str(),
                subscriber_id,
                pattern,
                err = %err,
                "unsubscribe ignored"
            ),
        }
    }

    // Commands

    /// Merges `handlers` into the registry; later names overwrite earlier ones.
    pub fn register_command_handlers<I>(&self, handlers: I)
    where
        I: IntoIterator<Item = (String, CommandHandler)>,
    {
        lock(&self.handlers).extend(handlers);
    }

    pub fn register_command_handler<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Value, Replier) + Send + Sync + 'static,
    {
        let handler: CommandHandler = Arc::new(handler);
        self.register_command_handlers(iter::once((name.into(), handler)));
    }

    /// Publishes a command and remembers the callbacks for its answer.
    ///
    /// Exactly one of `on_success` and `on_error` runs: on a positive answer, on
    /// a negative answer, or on expiry after the configured TTL.
    pub fn send_command<S, E>(&self, name: &str, data: Value, on_success: S, on_error: E) -> RequestId
    where
        S: FnOnce(Value) + Send + 'static,
        E: FnOnce(Value) + Send + 'static,
    {
        // Registering under the state lock keeps an early answer from racing the insert.
        let mut state = lock(&self.state);
        let request_id = self.bus.publish_command(name, data);
        state
            .pending
            .insert(request_id.clone(), Box::new(on_success), Box::new(on_error));
        drop(state);

        debug!(
            event = events::FACADE_COMMAND_SENT,
            component = COMPONENT,
            facade = self.config.name.as_str(),
            name,
            request_id = request_id.as_str(),
            "command sent"
        );
        request_id
    }

    pub fn send_answer(&self, result: bool, data: Value, request_id: RequestId) {
        self.bus.publish_answer("", result, data, request_id);
    }

    pub fn send_status(&self, topic: &str, data: Value) {
        self.bus.publish(topic, data);
    }

    pub fn replier(&self, request_id: RequestId) -> Replier {
        Replier::new(self.bus(), request_id)
    }

    pub fn pending_requests(&self) -> usize {
        lock(&self.state).pending.len()
    }

    // Draining

    /// Dispatches everything currently queued on the calling thread and
    /// expires stale requests. Returns the number of envelopes handled.
    ///
    /// Does nothing while the dedicated drain thread is running.
    pub fn drain_pending(&self) -> usize {
        let mut handled = 0;
        loop {
            let next = {
                let mut receiver = lock(&self.receiver);
                match receiver.as_mut() {
                    Some(receiver) => receiver.try_recv().ok(),
                    None => None,
                }
            };
            let Some(envelope) = next else {
                break;
            };
            self.dispatch(&envelope);
            handled += 1;
        }
        self.expire_pending(Instant::now());
        handled
    }

    /// Spawns the named drain thread. Calling it again while running is a no-op.
    ///
    /// The thread keeps the facade alive until [`ConsumerFacade::stop`] is called.
    pub fn start(self: &Arc<Self>) -> Result<(), BusError> {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            return Ok(());
        }

        let thread_name = build_thread_name(DRAIN_THREAD_NAME_PREFIX, &self.config.name);
        let receiver = lock(&self.receiver)
            .take()
            .ok_or_else(|| BusError::WorkerUnavailable {
                name: thread_name.clone(),
                reason: "queue already owned by another drain loop".to_string(),
            })?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let facade = Arc::clone(self);
        let handle = spawn_runtime_thread(thread_name, move || async move {
            facade.drain_loop(receiver, stop_rx).await;
        })?;

        *worker = Some(DrainWorker {
            stop: stop_tx,
            handle,
        });
        Ok(())
    }

    /// Stops the drain thread and waits for it, unless called from that thread.
    pub fn stop(&self) {
        let Some(worker) = lock(&self.worker).take() else {
            return;
        };
        let _ = worker.stop.send(());

        if worker.handle.thread().id() == thread::current().id() {
            return;
        }
        if worker.handle.join().is_err() {
            error!(
                event = events::FACADE_DRAIN_STOP,
                component = COMPONENT,
                facade = self.config.name.as_str(),
                "drain thread ended with a panic"
            );
        }
    }

    async fn drain_loop(&self, mut receiver: BusReceiver, mut stop_rx: oneshot::Receiver<()>) {
        let worker = fields::WorkerContext::with_current_thread(self.config.name.as_str());
        info!(
            event = events::FACADE_DRAIN_START,
            component = COMPONENT,
            worker_id = worker.worker_id.as_str(),
            worker_thread = worker.worker_thread.as_str(),
            "drain loop started"
        );

        let mut sweep = tokio::time::interval(self.config.sweep_interval);
        let reason = loop {
            tokio::select! {
                _ = &mut stop_rx => break fields::REASON_STOP_REQUESTED,
                next = receiver.recv() => match next {
                    Some(envelope) => self.dispatch(&envelope),
                    None => break fields::REASON_QUEUE_CLOSED,
                },
                _ = sweep.tick() => self.expire_pending(Instant::now()),
            }
        };

        info!(
            event = events::FACADE_DRAIN_STOP,
            component = COMPONENT,
            worker_id = worker.worker_id.as_str(),
            worker_thread = worker.worker_thread.as_str(),
            reason,
            "drain loop stopped"
        );
        *lock(&self.receiver) = Some(receiver);
    }

    fn dispatch(&self, envelope: &Envelope) {
        trace!(
            component = COMPONENT,
            facade = self.config.name.as_str(),
            name = envelope.name.as_str(),
            kind = fields::format_envelope_kind(envelope),
            request_id = fields::format_request_id(envelope),
            "dispatching envelope"
        );

        if envelope.is_command && envelope.name.is_empty() {
            if let Some(request_id) = envelope.request_id.as_deref() {
                if self.dispatch_answer(envelope, request_id) {
                    return;
                }
            }
        }

        // Named answers without a pending request fall through to the registry.
        if envelope.is_answer() && envelope.name.is_empty() {
            trace!(
                component = COMPONENT,
                facade = self.config.name.as_str(),
                err = %BusError::UnmatchedAnswer(fields::format_request_id(envelope).to_string()),
                "dropping answer"
            );
        } else if envelope.is_command {
            self.dispatch_command(envelope);
        } else {
            self.dispatch_status(&envelope.name, &envelope.data);
        }
    }

    fn dispatch_answer(&self, envelope: &Envelope, request_id: &str) -> bool {
        let Some(pending) = lock(&self.state).pending.take(request_id) else {
            return false;
        };

        let succeeded = envelope.result == Some(true);
        debug!(
            event = events::FACADE_ANSWER_MATCHED,
            component = COMPONENT,
            facade = self.config.name.as_str(),
            request_id,
            succeeded,
            "answer matched"
        );

        let data = envelope.data.clone();
        let callback = if succeeded {
            pending.on_success
        } else {
            pending.on_error
        };
        self.run_isolated("answer", request_id, move || callback(data));
        true
    }

    fn dispatch_command(&self, envelope: &Envelope) {
        let handler = lock(&self.handlers).get(&envelope.name).cloned();
        let (Some(handler), Some(request_id)) = (handler, envelope.request_id.clone()) else {
            trace!(
                event = events::FACADE_COMMAND_UNHANDLED,
                component = COMPONENT,
                facade = self.config.name.as_str(),
                name = envelope.name.as_str(),
                "no handler for command"
            );
            return;
        };

        let replier = self.replier(request_id);
        self.run_isolated("command", &envelope.name, || {
            handler(&envelope.data, replier)
        });
    }

    fn dispatch_status(&self, name: &str, data: &Value) {
        let derived = lock(&self.converter).convert(name, data);

        let statuses = iter::once((name, data)).chain(
            derived
                .iter()
                .map(|status| (status.name.as_str(), &status.data)),
        );

        for (status_name, status_data) in statuses {
            let matches = lock(&self.state).index.matching(status_name);
            for (pattern, subscriber) in matches {
                let update = StatusUpdate {
                    name: status_name,
                    data: status_data,
                    pattern: &pattern,
                };
                self.run_isolated("status", status_name, || subscriber.notify(&update));
            }
        }
    }

    fn expire_pending(&self, now: Instant) {
        let expired = lock(&self.state).pending.take_expired(now);
        for (request_id, pending) in expired {
            let err = BusError::RequestTimedOut(request_id.clone());
            warn!(
                event = events::FACADE_REQUEST_EXPIRED,
                component = COMPONENT,
                facade = self.config.name.as_str(),
                request_id = request_id.as_str(),
                "pending request expired"
            );
            let on_error = pending.on_error;
            self.run_isolated("answer", &request_id, move || {
                on_error(Value::String(err.to_string()))
            });
        }
    }

    fn run_isolated<F: FnOnce()>(&self, callback: &str, name: &str, f: F) {
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(f)) {
            error!(
                event = events::FACADE_CALLBACK_PANICKED,
                component = COMPONENT,
                facade = self.config.name.as_str(),
                callback,
                name,
                panic = panic_message(panic.as_ref()),
                "callback panicked; continuing"
            );
        }
    }
}
