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

//! Wire shape of a single bus message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque identifier correlating a command with its answer.
pub type RequestId = String;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One bus message: a status broadcast, a command request, or a command answer.
///
/// Status envelopes never carry a request id. Command envelopes always do; the
/// presence of `result` distinguishes an answer from a fresh request.
pub struct Envelope {
    pub name: String,
    pub data: Value,
    pub is_command: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<bool>,
}

impl Envelope {
    pub fn status(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
            is_command: false,
            request_id: None,
            result: None,
        }
    }

    pub fn command(name: impl Into<String>, data: Value, request_id: RequestId) -> Self {
        Self {
            name: name.into(),
            data,
            is_command: true,
            request_id: Some(request_id),
            result: None,
        }
    }

    pub fn answer(
        name: impl Into<String>,
        result: bool,
        data: Value,
        request_id: RequestId,
    ) -> Self {
        Self {
            name: name.into(),
            data,
            is_command: true,
            request_id: Some(request_id),
            result: Some(result),
        }
    }

    pub fn is_answer(&self) -> bool {
        self.is_command && self.result.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::Envelope;
    use serde_json::json;

    #[test]
    fn status_serializes_without_correlation_fields() {
        let envelope = Envelope::status("gw1-temperature-0", json!({"value": 1.0}));
        let encoded = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            encoded,
            json!({"name": "gw1-temperature-0", "data": {"value": 1.0}, "isCommand": false})
        );
    }

    #[test]
    fn answer_is_a_command_with_result() {
        let answer = Envelope::answer("", false, json!("boom"), "req-1".to_string());
        assert!(answer.is_answer());

        let request = Envelope::command("GET_ALARMS", json!({}), "req-2".to_string());
        assert!(!request.is_answer());

        let decoded: Envelope = serde_json::from_value(serde_json::to_value(&answer).unwrap())
            .expect("answer should decode");
        assert_eq!(decoded, answer);
    }
}
