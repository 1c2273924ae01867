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

//! Error taxonomy for bus and facade operations.

use thiserror::Error;

/// Errors surfaced by the bus layer.
///
/// None of these are fatal to a drain loop: callers log them and move on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Unsubscribe of an id or pattern the facade does not know.
    #[error("subscriber `{subscriber_id}` is not subscribed to `{pattern}`")]
    SubscriptionNotFound {
        subscriber_id: String,
        pattern: String,
    },

    /// A topic key that does not have exactly three non-empty segments.
    #[error("malformed topic key `{0}`")]
    MalformedTopicKey(String),

    /// An answer whose request id has no pending entry.
    #[error("no pending request for answer `{0}`")]
    UnmatchedAnswer(String),

    /// The pending request expired before an answer arrived.
    #[error("request `{0}` timed out")]
    RequestTimedOut(String),

    /// A dedicated worker thread could not be spawned or is already gone.
    #[error("worker `{name}` unavailable: {reason}")]
    WorkerUnavailable { name: String, reason: String },
}
