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

use telemetry_bus::BusError;
use thiserror::Error;

/// Why one wire message could not be turned into canonical items.
///
/// Translation failures are logged and the message is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("malformed topic `{topic}`: {reason}")]
    MalformedTopic { topic: String, reason: String },

    #[error("malformed payload on `{topic}`: {reason}")]
    MalformedPayload { topic: String, reason: String },
}

impl TranslateError {
    pub fn topic(topic: &str, reason: impl Into<String>) -> Self {
        Self::MalformedTopic {
            topic: topic.to_string(),
            reason: reason.into(),
        }
    }

    pub fn payload(topic: &str, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            topic: topic.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures of the wire connection or of the adapter's own plumbing.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("wire is not connected")]
    NotConnected,

    #[error("wire connection failed: {0}")]
    Connection(String),

    #[error("publish to `{topic}` failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Bus(#[from] BusError),
}
