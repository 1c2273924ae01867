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

use crate::envelope::RequestId;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One-shot callback receiving the answer payload.
pub type AnswerCallback = Box<dyn FnOnce(Value) + Send>;

/// Callbacks waiting for the answer to one command.
pub(crate) struct PendingRequest {
    pub(crate) on_success: AnswerCallback,
    pub(crate) on_error: AnswerCallback,
    pub(crate) created_at: Instant,
}

/// Pending requests keyed by request id.
///
/// An entry leaves the table exactly once: on its answer or on expiry.
pub(crate) struct PendingTable {
    ttl: Duration,
    requests: HashMap<RequestId, PendingRequest>,
}

impl PendingTable {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            requests: HashMap::new(),
        }
    }

    pub(crate) fn insert(
        &mut self,
        request_id: RequestId,
        on_success: AnswerCallback,
        on_error: AnswerCallback,
    ) {
        self.requests.insert(
            request_id,
            PendingRequest {
                on_success,
                on_error,
                created_at: Instant::now(),
            },
        );
    }

    pub(crate) fn take(&mut self, request_id: &str) -> Option<PendingRequest> {
        self.requests.remove(request_id)
    }

    /// Removes every entry older than the TTL at `now`.
    pub(crate) fn take_expired(&mut self, now: Instant) -> Vec<(RequestId, PendingRequest)> {
        let ttl = self.ttl;
        let expired: Vec<RequestId> = self
            .requests
            .iter()
            .filter(|(_, pending)| now.saturating_duration_since(pending.created_at) >= ttl)
            .map(|(request_id, _)| request_id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|request_id| {
                self.requests
                    .remove(&request_id)
                    .map(|pending| (request_id, pending))
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::PendingTable;
    use std::time::{Duration, Instant};

    #[test]
    fn take_is_one_shot() {
        let mut table = PendingTable::new(Duration::from_secs(60));
        table.insert("r1".to_string(), Box::new(|_| {}), Box::new(|_| {}));

        assert!(table.take("r1").is_some());
        assert!(table.take("r1").is_none());
    }

    #[test]
    fn expiry_only_collects_entries_past_ttl() {
        let mut table = PendingTable::new(Duration::from_secs(60));
        table.insert("fresh".to_string(), Box::new(|_| {}), Box::new(|_| {}));

        assert!(table.take_expired(Instant::now()).is_empty());

        let later = Instant::now() + Duration::from_secs(61);
        let expired = table.take_expired(later);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, "fresh");
        assert_eq!(table.len(), 0);
    }
}
