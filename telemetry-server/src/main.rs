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

mod config;

use crate::config::{Config, TranslatorScheme};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use telemetry_bus::{Bus, ConsumerFacade, DataConverter, FacadeConfig, InMemoryBus};
use telemetry_services::alarm::{AlarmConfigStore, AlarmEvaluator, MemoryAlarmStore, SqliteAlarmStore};
use telemetry_services::gateway::GatewayManager;
use telemetry_services::ingest::{
    DirectTranslator, IngestConfig, IngestionAdapter, IoCloudTranslator, MqttSettings, MqttWire,
    PayloadTranslator,
};
use telemetry_services::storage::{
    AsyncBridge, MemorySensorStore, SensorStore, SqliteSensorStore, StorageSettings,
    StorageWriteQueue, DEFAULT_BRIDGE_THREAD_NAME,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const MQTT_FACADE_NAME: &str = "mqtt";

#[derive(Parser)]
#[command()]
struct ServerArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
}

fn load_config(path: &str) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read config file {path}"))?;
    let config: Config = json5::from_str(&contents)
        .with_context(|| format!("unable to parse config file {path}"))?;
    config
        .validate()
        .with_context(|| format!("invalid config file {path}"))?;
    Ok(config)
}

fn sensor_store(config: &Config) -> Result<Arc<dyn SensorStore>> {
    let retention = chrono::Duration::days(config.storage.retention_days);
    Ok(match &config.storage.database_path {
        Some(path) => Arc::new(
            SqliteSensorStore::open(path)
                .with_context(|| format!("unable to open sensor database {path}"))?
                .with_retention(retention),
        ),
        None => Arc::new(MemorySensorStore::with_retention(retention)),
    })
}

fn alarm_store(config: &Config) -> Result<Arc<dyn AlarmConfigStore>> {
    Ok(match &config.alarms.database_path {
        Some(path) => Arc::new(
            SqliteAlarmStore::open(path)
                .with_context(|| format!("unable to open alarm database {path}"))?,
        ),
        None => Arc::new(MemoryAlarmStore::new()),
    })
}

fn translator(scheme: TranslatorScheme) -> Box<dyn PayloadTranslator> {
    match scheme {
        TranslatorScheme::IoCloud => Box::new(IoCloudTranslator::new()),
        TranslatorScheme::Direct => Box::new(DirectTranslator),
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    info!("Started telemetry-server");

    let args = ServerArgs::parse();
    let config = load_config(&args.config)?;

    let request_ttl = Duration::from_secs(config.bus.request_ttl_secs);
    let bus: Arc<dyn Bus> = Arc::new(InMemoryBus::new());
    let facade = ConsumerFacade::with_config(
        Arc::clone(&bus),
        FacadeConfig {
            request_ttl,
            ..FacadeConfig::named(config.bus.name.clone())
        },
        DataConverter::default(),
    );
    // The MQTT side consumes the bus through its own queue.
    let mqtt_facade = ConsumerFacade::with_config(
        Arc::clone(&bus),
        FacadeConfig {
            request_ttl,
            ..FacadeConfig::named(MQTT_FACADE_NAME)
        },
        DataConverter::passthrough(),
    );

    let bridge = Arc::new(
        AsyncBridge::start(DEFAULT_BRIDGE_THREAD_NAME).context("unable to start storage bridge")?,
    );
    let storage = StorageWriteQueue::new(
        Arc::clone(&facade),
        sensor_store(&config)?,
        Arc::clone(&bridge),
        StorageSettings {
            flush_interval: Duration::from_millis(config.storage.flush_interval_ms),
            patterns: config.storage.patterns.clone(),
        },
    )
    .context("unable to start sensor storage")?;

    let evaluator = AlarmEvaluator::new(
        Arc::clone(&facade),
        alarm_store(&config)?,
        config.alarms.queue_capacity,
    )
    .context("unable to start alarm evaluator")?;

    let gateways = GatewayManager::new(Arc::clone(&facade), config.gateways.capacity);

    let wire = MqttWire::new(MqttSettings {
        host: config.mqtt.hostname.clone(),
        port: config.mqtt.port,
        client_id: config.mqtt.client_id.clone(),
        keep_alive: Duration::from_secs(config.mqtt.keep_alive_secs),
    });
    let adapter = IngestionAdapter::start(
        Arc::clone(&mqtt_facade),
        IngestConfig {
            inbound_prefix: config.mqtt.inbound_prefix.clone(),
            request_prefix: config.mqtt.request_prefix.clone(),
            queue_capacity: config.mqtt.queue_capacity,
            reconnect_delay: config.mqtt.reconnect_delay(),
        },
        Box::new(wire),
        translator(config.mqtt.scheme),
    )
    .context("unable to start MQTT ingestion")?;

    facade.start().context("unable to start bus drain thread")?;
    mqtt_facade
        .start()
        .context("unable to start MQTT bus drain thread")?;
    evaluator.start().context("unable to start alarm evaluation")?;
    storage.start().context("unable to start storage flush")?;
    gateways.start();

    info!(
        mqtt_host = config.mqtt.hostname.as_str(),
        mqtt_port = config.mqtt.port,
        "telemetry-server running; press Ctrl-C to stop"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("unable to build signal runtime")?;
    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("unable to listen for Ctrl-C")?;

    info!("shutting down");
    adapter.stop();
    storage.stop();
    evaluator.stop();
    mqtt_facade.stop();
    facade.stop();
    bridge.shutdown();

    Ok(())
}
