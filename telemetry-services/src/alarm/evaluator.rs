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

//! Threshold alarm evaluation.
//!
//! Each alarm topic gets one bus subscriber whose callback only enqueues the
//! reading together with the alarm topic it matched. A separate loop drains
//! the queue in batches, evaluates only the rules registered under that
//! topic, persists the resulting events and broadcasts them on
//! [`ALARM_NEW_EVENT_TOPIC`].

use super::config_store::AlarmConfigStore;
use super::error::AlarmError;
use super::model::{Alarm, AlarmEvent};
use crate::commands;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use telemetry_bus::observability::events;
use telemetry_bus::runtime::spawn_runtime_thread;
use telemetry_bus::topic_key::ALARM_NEW_EVENT_TOPIC;
use telemetry_bus::{ConsumerFacade, Reading, Replier, Subscriber};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "alarm_evaluator";
const EVALUATION_THREAD_NAME: &str = "tb-alarms";
const SUBSCRIBER_ID_PREFIX: &str = "alarm-evaluator";

pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

#[derive(Deserialize)]
struct RemoveAlarmRequest {
    id: i64,
}

#[derive(Deserialize)]
struct ChangeThresholdRequest {
    id: i64,
    threshold: f64,
    topic: String,
}

/// A reading and the alarm topic whose subscriber received it.
struct Queued {
    topic: String,
    reading: Reading,
}

struct EvaluationWorker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct AlarmEvaluator {
    facade: Arc<ConsumerFacade>,
    store: Arc<dyn AlarmConfigStore>,
    rules: Mutex<BTreeMap<String, Vec<Alarm>>>,
    queue_tx: mpsc::Sender<Queued>,
    queue_rx: Mutex<Option<mpsc::Receiver<Queued>>>,
    worker: Mutex<Option<EvaluationWorker>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn subscriber_id(topic: &str) -> String {
    format!("{SUBSCRIBER_ID_PREFIX}-{topic}")
}

impl AlarmEvaluator {
    /// Registers the alarm commands and installs every persisted alarm.
    pub fn new(
        facade: Arc<ConsumerFacade>,
        store: Arc<dyn AlarmConfigStore>,
        queue_capacity: usize,
    ) -> Result<Arc<Self>, AlarmError> {
        let (queue_tx, queue_rx) = mpsc::channel(queue_capacity.max(1));
        let evaluator = Arc::new(Self {
            facade,
            store,
            rules: Mutex::new(BTreeMap::new()),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            worker: Mutex::new(None),
        });

        for alarm in evaluator.store.load_alarms()? {
            evaluator.setup_alarm(alarm);
        }
        evaluator.register_commands();

        info!(
            event = events::ALARM_SETUP,
            component = COMPONENT,
            topics = lock(&evaluator.rules).len(),
            "alarm evaluator initialized"
        );
        Ok(evaluator)
    }

    /// Installs `alarm` in the rule table, subscribing to its topic on first use.
    pub fn setup_alarm(&self, alarm: Alarm) {
        let mut rules = lock(&self.rules);
        let topic = alarm.topic.clone();

        let topic_rules = rules.entry(topic.clone()).or_insert_with(|| {
            let queue = self.queue_tx.clone();
            self.facade.add_subscription(
                Subscriber::new(subscriber_id(&topic), move |update| {
                    enqueue_reading(&queue, update.pattern, update.name, update.data)
                }),
                &topic,
            );
            Vec::new()
        });

        debug!(
            event = events::ALARM_SETUP,
            component = COMPONENT,
            alarm_id = alarm.id,
            topic = topic.as_str(),
            comparison = %alarm.comparison,
            threshold = alarm.threshold,
            "alarm installed"
        );
        topic_rules.push(alarm);
    }

    /// Persists a new alarm and installs it.
    pub fn add_alarm(&self, mut alarm: Alarm) -> Result<Alarm, AlarmError> {
        alarm.id = self.store.add_alarm(&alarm)?;
        self.setup_alarm(alarm.clone());
        Ok(alarm)
    }

    /// Removes the alarm; the topic subscription goes away with its last alarm.
    pub fn remove_alarm(&self, alarm_id: i64) -> Result<(), AlarmError> {
        let mut rules = lock(&self.rules);
        let topic = rules
            .iter()
            .find(|(_, alarms)| alarms.iter().any(|alarm| alarm.id == alarm_id))
            .map(|(topic, _)| topic.clone())
            .ok_or(AlarmError::NotFound(alarm_id))?;

        self.store.remove_alarm(alarm_id)?;

        let now_empty = rules.get_mut(&topic).map_or(false, |alarms| {
            alarms.retain(|alarm| alarm.id != alarm_id);
            alarms.is_empty()
        });
        if now_empty {
            rules.remove(&topic);
            self.facade
                .remove_subscription(&subscriber_id(&topic), &topic)?;
        }

        info!(
            event = events::ALARM_REMOVED,
            component = COMPONENT,
            alarm_id,
            topic = topic.as_str(),
            unsubscribed = now_empty,
            "alarm removed"
        );
        Ok(())
    }

    /// Updates the threshold of the alarm on `topic`. An unchanged threshold is a no-op.
    pub fn change_alarm_threshold(
        &self,
        alarm_id: i64,
        new_threshold: f64,
        topic: &str,
    ) -> Result<Alarm, AlarmError> {
        let mut rules = lock(&self.rules);
        let alarm = rules
            .get_mut(topic)
            .and_then(|alarms| alarms.iter_mut().find(|alarm| alarm.id == alarm_id))
            .ok_or(AlarmError::NotFound(alarm_id))?;

        if alarm.threshold == new_threshold {
            return Ok(alarm.clone());
        }

        let mut updated = alarm.clone();
        updated.threshold = new_threshold;
        self.store.update_alarm(&updated)?;
        *alarm = updated.clone();
        Ok(updated)
    }

    pub fn alarms(&self) -> Vec<Alarm> {
        lock(&self.rules).values().flatten().cloned().collect()
    }

    /// Topics that currently hold at least one alarm.
    pub fn topics(&self) -> Vec<String> {
        lock(&self.rules).keys().cloned().collect()
    }

    // Evaluation

    /// Evaluates everything already queued on the calling thread.
    /// Returns the number of events raised.
    pub fn evaluate_pending(&self) -> usize {
        let mut batch = Vec::new();
        {
            let mut queue = lock(&self.queue_rx);
            let Some(queue) = queue.as_mut() else {
                return 0;
            };
            while let Ok(queued) = queue.try_recv() {
                batch.push(queued);
            }
        }
        self.evaluate_batch(&batch)
    }

    /// Spawns the evaluation thread. Calling it again while running is a no-op.
    pub fn start(self: &Arc<Self>) -> Result<(), AlarmError> {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            return Ok(());
        }
        let Some(queue) = lock(&self.queue_rx).take() else {
            return Ok(());
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let evaluator = Arc::clone(self);
        let handle = spawn_runtime_thread(EVALUATION_THREAD_NAME.to_string(), move || async move {
            evaluator.evaluation_loop(queue, stop_rx).await;
        })?;

        *worker = Some(EvaluationWorker {
            stop: stop_tx,
            handle,
        });
        Ok(())
    }

    pub fn stop(&self) {
        let Some(worker) = lock(&self.worker).take() else {
            return;
        };
        let _ = worker.stop.send(());
        if worker.handle.join().is_err() {
            error!(
                component = COMPONENT,
                "evaluation thread ended with a panic"
            );
        }
    }

    async fn evaluation_loop(
        &self,
        mut queue: mpsc::Receiver<Queued>,
        mut stop_rx: oneshot::Receiver<()>,
    ) {
        loop {
            let first = tokio::select! {
                _ = &mut stop_rx => break,
                next = queue.recv() => match next {
                    Some(queued) => queued,
                    None => break,
                },
            };

            let mut batch = vec![first];
            while let Ok(queued) = queue.try_recv() {
                batch.push(queued);
            }
            self.evaluate_batch(&batch);
        }

        *lock(&self.queue_rx) = Some(queue);
    }

    fn evaluate_batch(&self, batch: &[Queued]) -> usize {
        if batch.is_empty() {
            return 0;
        }

        let raised: Vec<AlarmEvent> = {
            let rules = lock(&self.rules);
            batch
                .iter()
                .flat_map(|Queued { topic, reading }| {
                    rules
                        .get(topic)
                        .into_iter()
                        .flatten()
                        .filter(|alarm| alarm.triggers(reading.value))
                        .map(|alarm| AlarmEvent::for_alarm(alarm, reading.timestamp, reading.value))
                        .collect::<Vec<_>>()
                })
                .collect()
        };

        if raised.is_empty() {
            return 0;
        }

        if let Err(err) = self.store.add_events(&raised) {
            error!(
                event = events::ALARM_PERSIST_FAILED,
                component = COMPONENT,
                events = raised.len(),
                err = %err,
                "unable to persist alarm events"
            );
            return 0;
        }

        for alarm_event in &raised {
            info!(
                event = events::ALARM_TRIGGERED,
                component = COMPONENT,
                alarm_id = alarm_event.alarm_id,
                value = alarm_event.value,
                "alarm triggered"
            );
            self.facade
                .send_status(ALARM_NEW_EVENT_TOPIC, alarm_event.to_value());
        }
        raised.len()
    }

    // Commands

    fn register_commands(self: &Arc<Self>) {
        let evaluator = Arc::downgrade(self);
        self.facade
            .register_command_handler(commands::ADD_ALARM, move |data, replier| {
                let Some(evaluator) = evaluator.upgrade() else {
                    return;
                };
                let outcome = serde_json::from_value::<Alarm>(data.clone())
                    .map_err(AlarmError::from)
                    .and_then(|alarm| evaluator.add_alarm(alarm))
                    .map(|alarm| alarm.to_value());
                answer(commands::ADD_ALARM, outcome, &replier);
            });

        let evaluator = Arc::downgrade(self);
        self.facade
            .register_command_handler(commands::REMOVE_ALARM, move |data, replier| {
                let Some(evaluator) = evaluator.upgrade() else {
                    return;
                };
                let outcome = serde_json::from_value::<RemoveAlarmRequest>(data.clone())
                    .map_err(AlarmError::from)
                    .and_then(|request| {
                        evaluator.remove_alarm(request.id).map(|()| json!(request.id))
                    });
                answer(commands::REMOVE_ALARM, outcome, &replier);
            });

        let evaluator = Arc::downgrade(self);
        self.facade
            .register_command_handler(commands::GET_ALARMS, move |_, replier| {
                let Some(evaluator) = evaluator.upgrade() else {
                    return;
                };
                let outcome = evaluator
                    .store
                    .load_alarms()
                    .map(|alarms| Value::Array(alarms.iter().map(Alarm::to_value).collect()));
                answer(commands::GET_ALARMS, outcome, &replier);
            });

        let evaluator = Arc::downgrade(self);
        self.facade
            .register_command_handler(commands::CHANGE_ALARM_THRESHOLD, move |data, replier| {
                let Some(evaluator) = evaluator.upgrade() else {
                    return;
                };
                let outcome = serde_json::from_value::<ChangeThresholdRequest>(data.clone())
                    .map_err(AlarmError::from)
                    .and_then(|request| {
                        evaluator.change_alarm_threshold(
                            request.id,
                            request.threshold,
                            &request.topic,
                        )
                    })
                    .map(|alarm| alarm.to_value());
                answer(commands::CHANGE_ALARM_THRESHOLD, outcome, &replier);
            });

        let evaluator = Arc::downgrade(self);
        self.facade
            .register_command_handler(commands::REMOVE_ALL_EVENTS, move |_, replier| {
                let Some(evaluator) = evaluator.upgrade() else {
                    return;
                };
                let outcome = evaluator.store.remove_all_events().map(|removed| json!(removed));
                answer(commands::REMOVE_ALL_EVENTS, outcome, &replier);
            });
    }
}

fn enqueue_reading(queue: &mpsc::Sender<Queued>, topic: &str, name: &str, data: &Value) {
    let Some(reading) = Reading::from_value(data) else {
        debug!(
            component = COMPONENT,
            name,
            "status is not a reading; skipping evaluation"
        );
        return;
    };

    let queued = Queued {
        topic: topic.to_string(),
        reading,
    };
    if queue.try_send(queued).is_err() {
        warn!(
            event = events::ALARM_QUEUE_FULL,
            component = COMPONENT,
            name,
            "evaluation queue full; dropping reading"
        );
    }
}

fn answer(command: &str, outcome: Result<Value, AlarmError>, replier: &Replier) {
    match outcome {
        Ok(data) => replier.reply(true, data),
        Err(err) => {
            warn!(
                component = COMPONENT,
                command,
                err = %err,
                "alarm command failed"
            );
            replier.reply(false, Value::String(err.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{subscriber_id, AlarmEvaluator};
    use crate::alarm::config_store::{AlarmConfigStore, MemoryAlarmStore};
    use crate::alarm::model::{Alarm, Comparison};
    use chrono::Utc;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use telemetry_bus::topic_key::ALARM_NEW_EVENT_TOPIC;
    use telemetry_bus::{Bus, ConsumerFacade, InMemoryBus, Reading, Subscriber};

    struct Fixture {
        bus: Arc<dyn Bus>,
        facade: Arc<ConsumerFacade>,
        store: Arc<MemoryAlarmStore>,
        evaluator: Arc<AlarmEvaluator>,
        raised: Arc<Mutex<Vec<Value>>>,
    }

    fn fixture() -> Fixture {
        let bus: Arc<dyn Bus> = Arc::new(InMemoryBus::new());
        let facade = ConsumerFacade::new(Arc::clone(&bus));
        let store = Arc::new(MemoryAlarmStore::new());
        let evaluator =
            AlarmEvaluator::new(Arc::clone(&facade), store.clone(), 64).expect("evaluator");

        let raised = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&raised);
        facade.add_subscription(
            Subscriber::new("event-sink", move |update| {
                sink.lock().unwrap().push(update.data.clone())
            }),
            ALARM_NEW_EVENT_TOPIC,
        );

        Fixture {
            bus,
            facade,
            store,
            evaluator,
            raised,
        }
    }

    fn alarm(comparison: Comparison) -> Alarm {
        Alarm {
            id: 0,
            name: format!("{comparison} 100"),
            topic: "gw1-temperature-0".to_string(),
            threshold: 100.0,
            comparison,
            panel_id: 1,
        }
    }

    impl Fixture {
        fn feed(&self, value: f64) -> usize {
            let topic = "gw1-temperature-0";
            self.bus
                .publish(topic, Reading::new(topic, Utc::now(), value).to_value());
            self.facade.drain_pending();
            let raised = self.evaluator.evaluate_pending();
            self.facade.drain_pending();
            raised
        }
    }

    #[test]
    fn higher_lower_and_equal_trigger_on_their_side_of_the_threshold() {
        for (comparison, hits, misses) in [
            (Comparison::Higher, vec![150.0], vec![50.0, 100.0]),
            (Comparison::Lower, vec![50.0], vec![150.0, 100.0]),
            (Comparison::Equal, vec![100.0], vec![99.9, 150.0]),
        ] {
            let fixture = fixture();
            fixture.evaluator.add_alarm(alarm(comparison)).unwrap();

            for value in hits {
                assert_eq!(fixture.feed(value), 1, "{comparison} should trigger for {value}");
            }
            for value in misses {
                assert_eq!(fixture.feed(value), 0, "{comparison} should not trigger for {value}");
            }
        }
    }

    #[test]
    fn raised_events_are_persisted_and_broadcast() {
        let fixture = fixture();
        let alarm = fixture.evaluator.add_alarm(alarm(Comparison::Higher)).unwrap();

        fixture.feed(150.0);

        let raised = fixture.raised.lock().unwrap();
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0]["alarmId"], alarm.id);
        assert_eq!(raised[0]["value"], 150.0);
        assert_eq!(fixture.store.events(Some(alarm.id)).unwrap().len(), 1);
    }

    #[test]
    fn subscription_follows_the_last_alarm_of_a_topic() {
        let fixture = fixture();
        let topic = "gw1-temperature-0";
        let first = fixture.evaluator.add_alarm(alarm(Comparison::Higher)).unwrap();
        let second = fixture.evaluator.add_alarm(alarm(Comparison::Lower)).unwrap();

        fixture.evaluator.remove_alarm(first.id).unwrap();
        assert!(fixture.facade.is_subscribed(&subscriber_id(topic), topic));
        assert_eq!(fixture.evaluator.alarms().len(), 1);

        fixture.evaluator.remove_alarm(second.id).unwrap();
        assert!(!fixture.facade.is_subscribed(&subscriber_id(topic), topic));
        assert!(fixture.evaluator.topics().is_empty());
    }

    #[test]
    fn unchanged_threshold_is_a_no_op() {
        let fixture = fixture();
        let alarm = fixture.evaluator.add_alarm(alarm(Comparison::Higher)).unwrap();

        let same = fixture
            .evaluator
            .change_alarm_threshold(alarm.id, 100.0, &alarm.topic)
            .unwrap();
        assert_eq!(same, alarm);

        let changed = fixture
            .evaluator
            .change_alarm_threshold(alarm.id, 120.0, &alarm.topic)
            .unwrap();
        assert_eq!(changed.threshold, 120.0);
        assert_eq!(fixture.store.load_alarms().unwrap()[0].threshold, 120.0);
        assert_eq!(fixture.feed(110.0), 0);
    }

    #[test]
    fn overlapping_alarm_topics_each_fire_once_per_reading() {
        let fixture = fixture();
        let exact = fixture.evaluator.add_alarm(alarm(Comparison::Higher)).unwrap();
        let wildcard = fixture
            .evaluator
            .add_alarm(Alarm {
                topic: "gw1-*-0".to_string(),
                ..alarm(Comparison::Higher)
            })
            .unwrap();

        assert_eq!(fixture.feed(150.0), 2);

        let raised = fixture.raised.lock().unwrap();
        let mut alarm_ids: Vec<i64> = raised
            .iter()
            .map(|event| event["alarmId"].as_i64().unwrap())
            .collect();
        alarm_ids.sort_unstable();
        assert_eq!(alarm_ids, vec![exact.id, wildcard.id]);
        assert_eq!(fixture.store.events(None).unwrap().len(), 2);
    }

    #[test]
    fn persisted_alarms_are_installed_at_startup() {
        let bus: Arc<dyn Bus> = Arc::new(InMemoryBus::new());
        let facade = ConsumerFacade::new(Arc::clone(&bus));
        let store = Arc::new(MemoryAlarmStore::new());
        store.add_alarm(&alarm(Comparison::Higher)).unwrap();

        let evaluator = AlarmEvaluator::new(Arc::clone(&facade), store, 64).unwrap();

        assert_eq!(evaluator.topics(), vec!["gw1-temperature-0".to_string()]);
        assert!(facade.is_subscribed(&subscriber_id("gw1-temperature-0"), "gw1-temperature-0"));
    }
}
