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
use std::fmt;
use std::sync::Arc;

/// A status delivered to a subscriber, together with the pattern that matched it.
#[derive(Clone, Copy, Debug)]
pub struct StatusUpdate<'a> {
    pub name: &'a str,
    pub data: &'a Value,
    pub pattern: &'a str,
}

pub type StatusCallback = Arc<dyn Fn(&StatusUpdate<'_>) + Send + Sync>;

/// Identified status callback.
///
/// Within one facade and pattern, ids are unique: registering the same id
/// again replaces the earlier callback.
#[derive(Clone)]
pub struct Subscriber {
    id: String,
    callback: StatusCallback,
}

impl Subscriber {
    pub fn new<F>(id: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&StatusUpdate<'_>) + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn notify(&self, update: &StatusUpdate<'_>) {
        (self.callback)(update)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}
