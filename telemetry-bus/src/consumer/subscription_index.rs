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

//! Pattern to subscriber-set index owned by one consumer facade.

use super::subscriber::Subscriber;
use crate::error::BusError;
use crate::topic_key::pattern_matches;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Refcounted subscriber binding under one pattern.
pub(crate) struct SubscriberBinding {
    pub(crate) ref_count: usize,
    pub(crate) subscriber: Arc<Subscriber>,
}

/// Subscribers grouped by the pattern they registered for.
///
/// Within a pattern, bindings keep registration order.
#[derive(Default)]
pub(crate) struct SubscriptionIndex {
    patterns: BTreeMap<String, Vec<SubscriberBinding>>,
}

impl SubscriptionIndex {
    /// Inserts or replaces `subscriber` under `pattern` with a single owner.
    pub(crate) fn insert(&mut self, pattern: &str, subscriber: Subscriber) {
        let bindings = self.patterns.entry(pattern.to_string()).or_default();
        let subscriber = Arc::new(subscriber);

        match bindings
            .iter_mut()
            .find(|binding| binding.subscriber.id() == subscriber.id())
        {
            Some(binding) => binding.subscriber = subscriber,
            None => bindings.push(SubscriberBinding {
                ref_count: 1,
                subscriber,
            }),
        }
    }

    /// Adds one owner to the binding for `subscriber`, creating it when absent.
    /// Returns the owner count after the call.
    pub(crate) fn retain(&mut self, pattern: &str, subscriber: Subscriber) -> usize {
        let bindings = self.patterns.entry(pattern.to_string()).or_default();

        if let Some(binding) = bindings
            .iter_mut()
            .find(|binding| binding.subscriber.id() == subscriber.id())
        {
            binding.ref_count += 1;
            return binding.ref_count;
        }

        bindings.push(SubscriberBinding {
            ref_count: 1,
            subscriber: Arc::new(subscriber),
        });
        1
    }

    /// Drops one owner; the binding goes away when no owner remains.
    /// Returns the remaining owner count.
    pub(crate) fn release(&mut self, pattern: &str, subscriber_id: &str) -> Result<usize, BusError> {
        let bindings = self
            .patterns
            .get_mut(pattern)
            .ok_or_else(|| not_found(subscriber_id, pattern))?;
        let position = bindings
            .iter()
            .position(|binding| binding.subscriber.id() == subscriber_id)
            .ok_or_else(|| not_found(subscriber_id, pattern))?;

        let binding = &mut bindings[position];
        binding.ref_count = binding.ref_count.saturating_sub(1);
        let remaining = binding.ref_count;

        if remaining == 0 {
            bindings.remove(position);
            if bindings.is_empty() {
                self.patterns.remove(pattern);
            }
        }
        Ok(remaining)
    }

    /// Removes the binding outright, regardless of how many owners it has.
    pub(crate) fn remove(&mut self, pattern: &str, subscriber_id: &str) -> Result<(), BusError> {
        let bindings = self
            .patterns
            .get_mut(pattern)
            .ok_or_else(|| not_found(subscriber_id, pattern))?;
        let position = bindings
            .iter()
            .position(|binding| binding.subscriber.id() == subscriber_id)
            .ok_or_else(|| not_found(subscriber_id, pattern))?;

        bindings.remove(position);
        if bindings.is_empty() {
            self.patterns.remove(pattern);
        }
        Ok(())
    }

    /// Collects `(pattern, subscriber)` pairs whose pattern matches `status_name`.
    pub(crate) fn matching(&self, status_name: &str) -> Vec<(String, Arc<Subscriber>)> {
        self.patterns
            .iter()
            .filter(|(pattern, _)| pattern_matches(pattern, status_name))
            .flat_map(|(pattern, bindings)| {
                bindings
                    .iter()
                    .map(move |binding| (pattern.clone(), Arc::clone(&binding.subscriber)))
            })
            .collect()
    }

    pub(crate) fn contains(&self, pattern: &str, subscriber_id: &str) -> bool {
        self.patterns.get(pattern).is_some_and(|bindings| {
            bindings
                .iter()
                .any(|binding| binding.subscriber.id() == subscriber_id)
        })
    }

    pub(crate) fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

fn not_found(subscriber_id: &str, pattern: &str) -> BusError {
    BusError::SubscriptionNotFound {
        subscriber_id: subscriber_id.to_string(),
        pattern: pattern.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriptionIndex;
    use crate::consumer::subscriber::Subscriber;
    use crate::error::BusError;

    fn noop(id: &str) -> Subscriber {
        Subscriber::new(id, |_| {})
    }

    #[test]
    fn wildcard_patterns_collect_matching_subscribers() {
        let mut index = SubscriptionIndex::default();
        index.insert("*-temperature-*", noop("a"));
        index.insert("gw1-*-0", noop("b"));
        index.insert("gw2-temperature-0", noop("c"));

        let ids: Vec<String> = index
            .matching("gw1-temperature-0")
            .into_iter()
            .map(|(_, subscriber)| subscriber.id().to_string())
            .collect();

        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"a".to_string()));
        assert!(ids.contains(&"b".to_string()));
    }

    #[test]
    fn reinsert_replaces_in_place() {
        let mut index = SubscriptionIndex::default();
        index.insert("a-b-c", noop("same"));
        index.insert("a-b-c", noop("same"));

        assert_eq!(index.matching("a-b-c").len(), 1);
    }

    #[test]
    fn release_removes_only_after_last_owner() {
        let mut index = SubscriptionIndex::default();
        assert_eq!(index.retain("a-b-c", noop("shared")), 1);
        assert_eq!(index.retain("a-b-c", noop("shared")), 2);

        assert_eq!(index.release("a-b-c", "shared"), Ok(1));
        assert!(index.contains("a-b-c", "shared"));
        assert_eq!(index.release("a-b-c", "shared"), Ok(0));
        assert!(!index.contains("a-b-c", "shared"));
        assert_eq!(index.pattern_count(), 0);
    }

    #[test]
    fn unknown_removal_is_reported() {
        let mut index = SubscriptionIndex::default();
        index.insert("a-b-c", noop("known"));

        assert!(matches!(
            index.remove("a-b-c", "missing"),
            Err(BusError::SubscriptionNotFound { .. })
        ));
        assert!(matches!(
            index.remove("x-y-z", "known"),
            Err(BusError::SubscriptionNotFound { .. })
        ));
        assert_eq!(index.remove("a-b-c", "known"), Ok(()));
    }
}
