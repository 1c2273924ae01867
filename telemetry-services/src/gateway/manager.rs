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

//! Tracks gateway presence announced on `gateway-status-*`.

use super::status_map::GatewayStatusMap;
use crate::commands;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use telemetry_bus::observability::events;
use telemetry_bus::topic_key::{GATEWAY_STATUS_TOPIC, GATEWAY_STATUS_UPDATE_TOPIC};
use telemetry_bus::{ConsumerFacade, GatewayStatus, RequestId, Subscriber};
use tracing::{debug, info, warn};

const COMPONENT: &str = "gateway_manager";
const SUBSCRIBER_ID: &str = "gateway-manager";

pub struct GatewayManager {
    facade: Arc<ConsumerFacade>,
    statuses: Mutex<GatewayStatusMap>,
}

impl GatewayManager {
    pub fn new(facade: Arc<ConsumerFacade>, capacity: usize) -> Arc<Self> {
        let manager = Arc::new(Self {
            facade,
            statuses: Mutex::new(GatewayStatusMap::with_capacity(capacity)),
        });

        let weak = Arc::downgrade(&manager);
        manager.facade.add_subscription(
            Subscriber::new(SUBSCRIBER_ID, move |update| {
                let Some(manager) = weak.upgrade() else {
                    return;
                };
                match GatewayStatus::from_value(update.data) {
                    Some(status) => manager.update(status),
                    None => warn!(
                        component = COMPONENT,
                        name = update.name,
                        "gateway status payload not understood"
                    ),
                }
            }),
            GATEWAY_STATUS_TOPIC,
        );
        manager.register_commands();
        manager
    }

    /// Asks every gateway to announce itself once.
    pub fn start(&self) -> RequestId {
        info!(component = COMPONENT, "requesting gateway status");
        self.request_update(
            |_| debug!(component = COMPONENT, "gateways acknowledged status request"),
            |reason| {
                warn!(
                    component = COMPONENT,
                    reason = %reason,
                    "gateway status request failed"
                )
            },
        )
    }

    /// Sends `SYSTEM_STATUS_REQUEST`; the callbacks receive its answer.
    pub fn request_update<S, E>(&self, on_success: S, on_error: E) -> RequestId
    where
        S: FnOnce(Value) + Send + 'static,
        E: FnOnce(Value) + Send + 'static,
    {
        self.facade.send_command(
            commands::SYSTEM_STATUS_REQUEST,
            json!({}),
            on_success,
            on_error,
        )
    }

    /// Stores `status` and republishes it on `gateway-statusupdate-*`.
    pub fn update(&self, status: GatewayStatus) {
        let evicted = self.statuses().insert(status.clone());
        if let Some(evicted) = evicted {
            debug!(
                event = events::GATEWAY_STATUS_EVICTED,
                component = COMPONENT,
                gateway = evicted.name.as_str(),
                "oldest gateway evicted"
            );
        }

        debug!(
            event = events::GATEWAY_STATUS_UPDATE,
            component = COMPONENT,
            gateway = status.name.as_str(),
            ip = status.ip.as_str(),
            uptime = status.uptime,
            "gateway status updated"
        );
        self.facade
            .send_status(GATEWAY_STATUS_UPDATE_TOPIC, status.to_value());
    }

    /// Known gateways in first-seen order.
    pub fn gateways(&self) -> Vec<GatewayStatus> {
        self.statuses().statuses()
    }

    fn statuses(&self) -> MutexGuard<'_, GatewayStatusMap> {
        self.statuses.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register_commands(self: &Arc<Self>) {
        let manager = Arc::downgrade(self);
        self.facade
            .register_command_handler(commands::GET_GATEWAYS, move |_, replier| {
                let Some(manager) = manager.upgrade() else {
                    return;
                };
                let gateways = manager
                    .gateways()
                    .iter()
                    .map(GatewayStatus::to_value)
                    .collect();
                replier.reply(true, Value::Array(gateways));
            });

        let manager = Arc::downgrade(self);
        self.facade
            .register_command_handler(commands::REQUEST_UPDATE_GATEWAYS, move |_, replier| {
                let Some(manager) = manager.upgrade() else {
                    return;
                };
                let failed = replier.clone();
                manager.request_update(
                    move |data| replier.reply(true, data),
                    move |data| failed.reply(false, data),
                );
            });
    }
}
