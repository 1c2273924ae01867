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

use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use telemetry_bus::Subscriber;
use tracing::debug;

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedStatus {
    pub name: String,
    pub pattern: String,
    pub data: Value,
}

/// Subscriber that keeps every status it is notified of.
#[derive(Clone)]
pub struct RecordingSubscriber {
    id: String,
    store: Arc<Mutex<Vec<RecordedStatus>>>,
}

impl RecordingSubscriber {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            store: Arc::new(Mutex::new(Vec::with_capacity(1024))),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// A bus subscriber that records into this store.
    pub fn subscriber(&self) -> Subscriber {
        let store = Arc::clone(&self.store);
        let id = self.id.clone();
        Subscriber::new(self.id.clone(), move |update| {
            debug!("within {id}! status: {} via {}", update.name, update.pattern);
            store.lock().unwrap().push(RecordedStatus {
                name: update.name.to_string(),
                pattern: update.pattern.to_string(),
                data: update.data.clone(),
            });
        })
    }

    pub fn received(&self) -> Vec<RecordedStatus> {
        self.store().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.store().iter().map(|status| status.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn store(&self) -> MutexGuard<'_, Vec<RecordedStatus>> {
        self.store.lock().unwrap()
    }
}
