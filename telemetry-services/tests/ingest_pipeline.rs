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

use chrono::Utc;
use integration_test_utils::{
    answer_channel, init_logging, loopback_wire, wait_for, CommandAnswer, LoopbackBroker,
    RecordingSubscriber,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use telemetry_bus::topic_key::ALARM_NEW_EVENT_TOPIC;
use telemetry_bus::{Bus, ConsumerFacade, InMemoryBus};
use telemetry_services::commands;
use telemetry_services::ingest::DirectTranslator;
use telemetry_services::{
    AlarmEvaluator, AsyncBridge, GatewayManager, IngestConfig, IngestionAdapter, MemoryAlarmStore,
    MemorySensorStore, StorageSettings, StorageWriteQueue,
};

const WAIT: Duration = Duration::from_secs(5);

struct Pipeline {
    services: Arc<ConsumerFacade>,
    mqtt: Arc<ConsumerFacade>,
    client: Arc<ConsumerFacade>,
    broker: LoopbackBroker,
    adapter: Arc<IngestionAdapter>,
    evaluator: Arc<AlarmEvaluator>,
    storage: Arc<StorageWriteQueue>,
    sensors: Arc<MemorySensorStore>,
    gateways: Arc<GatewayManager>,
}

impl Pipeline {
    fn start() -> Self {
        init_logging();
        let bus: Arc<dyn Bus> = Arc::new(InMemoryBus::new());
        let services = ConsumerFacade::new(Arc::clone(&bus));
        let mqtt = ConsumerFacade::new(Arc::clone(&bus));
        let client = ConsumerFacade::new(Arc::clone(&bus));

        let evaluator =
            AlarmEvaluator::new(Arc::clone(&services), Arc::new(MemoryAlarmStore::new()), 64)
                .unwrap();
        let sensors = Arc::new(MemorySensorStore::new());
        let storage = StorageWriteQueue::new(
            Arc::clone(&services),
            sensors.clone(),
            Arc::new(AsyncBridge::start("tb-storage").unwrap()),
            StorageSettings {
                flush_interval: Duration::from_millis(20),
                ..StorageSettings::default()
            },
        )
        .unwrap();
        let gateways = GatewayManager::new(Arc::clone(&services), 100);

        let (wire, broker) = loopback_wire();
        let adapter = IngestionAdapter::start(
            Arc::clone(&mqtt),
            IngestConfig {
                inbound_prefix: "prefix".to_string(),
                request_prefix: "prefix/request".to_string(),
                queue_capacity: 64,
                reconnect_delay: None,
            },
            Box::new(wire),
            Box::new(DirectTranslator),
        )
        .unwrap();

        services.start().unwrap();
        mqtt.start().unwrap();
        client.start().unwrap();
        evaluator.start().unwrap();
        storage.start().unwrap();
        assert!(wait_for(WAIT, || broker.is_connected()));

        Self {
            services,
            mqtt,
            client,
            broker,
            adapter,
            evaluator,
            storage,
            sensors,
            gateways,
        }
    }

    fn command(&self, name: &str, data: Value) -> CommandAnswer {
        let (on_success, on_error, answers) = answer_channel();
        self.client.send_command(name, data, on_success, on_error);
        answers.recv_timeout(WAIT).unwrap()
    }

    fn report(&self, gateway: &str, topic: &str, indicator: &str, value: f64) {
        let payload = json!({ "value": value, "timestamp": Utc::now().to_rfc3339() });
        self.broker.inject(
            &format!("prefix/{gateway}/report/{topic}/{indicator}"),
            payload.to_string(),
        );
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.adapter.stop();
        self.storage.stop();
        self.evaluator.stop();
        self.client.stop();
        self.mqtt.stop();
        self.services.stop();
    }
}

#[test]
fn wire_reports_are_stored_and_raise_alarms() {
    let pipeline = Pipeline::start();
    assert_eq!(pipeline.broker.filters(), vec!["prefix/#"]);

    let events = RecordingSubscriber::new("alarm-events");
    pipeline
        .client
        .add_subscription(events.subscriber(), ALARM_NEW_EVENT_TOPIC);

    let added = pipeline.command(
        commands::ADD_ALARM,
        json!({
            "name": "too hot",
            "topic": "gw1-temperature-0",
            "threshold": 100.0,
            "type": "Higher",
            "panelId": 1
        }),
    );
    assert!(added.result, "ADD_ALARM failed: {}", added.data);

    pipeline.report("gw1", "temperature", "0", 150.0);
    pipeline.report("gw1", "temperature", "0", 20.0);

    assert!(wait_for(WAIT, || events.len() == 1));
    assert_eq!(events.received()[0].data["value"], 150.0);
    assert!(wait_for(WAIT, || pipeline.sensors.len() == 2));

    let read = pipeline.command(
        commands::READ_SENSOR_INFO,
        json!({
            "sensorInfos": [{ "gateway": "gw1", "topic": "temperature", "indicator": "0" }]
        }),
    );
    assert!(read.result);
    let samples = read.data["info"]["gw1-temperature-0"].as_array().unwrap();
    assert_eq!(samples.len(), 2);
}

#[test]
fn malformed_wire_topics_are_dropped() {
    let pipeline = Pipeline::start();

    pipeline
        .broker
        .inject("prefix/gw1/report/temperature", r#"{"value":1.0,"timestamp":"2024-01-01T10:00:00Z"}"#);
    pipeline.report("gw1", "pressure", "0", 101.3);

    assert!(wait_for(WAIT, || pipeline.sensors.len() == 1));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(pipeline.sensors.len(), 1);
}

#[test]
fn gateway_status_flows_to_the_manager_and_update_requests_reach_the_wire() {
    let pipeline = Pipeline::start();

    pipeline
        .broker
        .inject("prefix/gw7/status", r#"{"ip":"10.0.0.7","uptime":5}"#);
    assert!(wait_for(WAIT, || pipeline.gateways.gateways().len() == 1));
    assert_eq!(pipeline.gateways.gateways()[0].name, "gw7");

    let listed = pipeline.command(commands::GET_GATEWAYS, Value::Null);
    assert!(listed.result);
    assert_eq!(listed.data[0]["ip"], "10.0.0.7");

    let requested = pipeline.command(commands::REQUEST_UPDATE_GATEWAYS, json!({}));
    assert!(requested.result, "status request failed: {}", requested.data);
    assert!(pipeline
        .broker
        .published()
        .iter()
        .any(|message| message.topic == "prefix/request/all/command"));
}
