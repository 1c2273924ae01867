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

//! Canonical structured field keys and value-format helpers.

use crate::envelope::Envelope;

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const WORKER_ID: &str = "worker_id";
pub const WORKER_THREAD: &str = "worker_thread";

pub const NAME: &str = "name";
pub const KIND: &str = "kind";
pub const REQUEST_ID: &str = "request_id";
pub const PATTERN: &str = "pattern";
pub const SUBSCRIBER_ID: &str = "subscriber_id";

pub const NONE: &str = "none";
pub const KIND_STATUS: &str = "status";
pub const KIND_COMMAND: &str = "command";
pub const KIND_ANSWER: &str = "answer";
pub const REASON_QUEUE_CLOSED: &str = "queue_closed";
pub const REASON_STOP_REQUESTED: &str = "stop_requested";
pub const DEFAULT_WORKER_THREAD: &str = "unknown-thread";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkerContext {
    pub worker_id: String,
    pub worker_thread: String,
}

impl WorkerContext {
    pub fn new(worker_id: impl Into<String>, worker_thread: Option<&str>) -> Self {
        Self {
            worker_id: worker_id.into(),
            worker_thread: thread_name_or_default(worker_thread),
        }
    }

    pub fn with_current_thread(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            worker_thread: current_thread_name_or_default(),
        }
    }
}

pub fn thread_name_or_default(thread_name: Option<&str>) -> String {
    thread_name.unwrap_or(DEFAULT_WORKER_THREAD).to_string()
}

pub fn current_thread_name_or_default() -> String {
    thread_name_or_default(std::thread::current().name())
}

pub fn format_envelope_kind(envelope: &Envelope) -> &'static str {
    if !envelope.is_command {
        KIND_STATUS
    } else if envelope.is_answer() {
        KIND_ANSWER
    } else {
        KIND_COMMAND
    }
}

pub fn format_request_id(envelope: &Envelope) -> &str {
    envelope.request_id.as_deref().unwrap_or(NONE)
}

#[cfg(test)]
mod tests {
    use super::{
        format_envelope_kind, format_request_id, thread_name_or_default, DEFAULT_WORKER_THREAD,
        KIND_ANSWER, KIND_COMMAND, KIND_STATUS, NONE,
    };
    use crate::envelope::Envelope;
    use serde_json::Value;

    #[test]
    fn envelope_kind_distinguishes_answers() {
        assert_eq!(
            format_envelope_kind(&Envelope::status("a-b-c", Value::Null)),
            KIND_STATUS
        );
        assert_eq!(
            format_envelope_kind(&Envelope::command("X", Value::Null, "1".into())),
            KIND_COMMAND
        );
        assert_eq!(
            format_envelope_kind(&Envelope::answer("", true, Value::Null, "1".into())),
            KIND_ANSWER
        );
    }

    #[test]
    fn request_id_falls_back_to_none() {
        assert_eq!(
            format_request_id(&Envelope::status("a-b-c", Value::Null)),
            NONE
        );
    }

    #[test]
    fn thread_name_or_default_falls_back_when_absent() {
        assert_eq!(thread_name_or_default(None), DEFAULT_WORKER_THREAD);
        assert_eq!(thread_name_or_default(Some("named-thread")), "named-thread");
    }
}
