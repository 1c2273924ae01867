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

//! Helpers for spawning the dedicated threads every component runs on.

use crate::error::BusError;
use crate::observability::events;
use std::future::Future;
use std::thread;
use tokio::runtime::Builder;
use tracing::{debug, error, warn};

const COMPONENT: &str = "worker_runtime";

/// Linux truncates thread names beyond this length.
pub const THREAD_NAME_MAX_LEN: usize = 15;

pub const DEFAULT_WORKER_THREAD_NAME: &str = "telemetry-worker";

/// Builds a `prefix` + id-suffix thread name that fits the OS limit.
///
/// Falls back to [`DEFAULT_WORKER_THREAD_NAME`] when the prefix leaves no room
/// or the id has no usable characters.
pub fn build_thread_name(prefix: &str, id: &str) -> String {
    let Some(suffix_len) = THREAD_NAME_MAX_LEN.checked_sub(prefix.len()) else {
        return fallback_thread_name(prefix);
    };

    let suffix: String = id
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .take(suffix_len)
        .collect();

    if suffix.is_empty() && suffix_len > 0 {
        return fallback_thread_name(prefix);
    }

    format!("{prefix}{suffix}")
}

fn fallback_thread_name(prefix: &str) -> String {
    warn!(
        event = events::RUNTIME_THREAD_NAME_FALLBACK,
        component = COMPONENT,
        prefix,
        "thread name does not fit; using default"
    );
    DEFAULT_WORKER_THREAD_NAME.to_string()
}

/// Spawns a named OS thread running a blocking loop.
pub fn spawn_worker_thread<F>(thread_name: String, run_loop: F) -> Result<thread::JoinHandle<()>, BusError>
where
    F: FnOnce() + Send + 'static,
{
    debug!(
        event = events::RUNTIME_SPAWN_START,
        component = COMPONENT,
        worker_thread = thread_name.as_str(),
        "spawning worker thread"
    );

    thread::Builder::new()
        .name(thread_name.clone())
        .spawn(run_loop)
        .map(|handle| {
            debug!(
                event = events::RUNTIME_SPAWN_OK,
                component = COMPONENT,
                worker_thread = thread_name.as_str(),
                "worker thread started"
            );
            handle
        })
        .map_err(|err| {
            error!(
                event = events::RUNTIME_SPAWN_FAILED,
                component = COMPONENT,
                worker_thread = thread_name.as_str(),
                err = %err,
                "unable to spawn worker thread"
            );
            BusError::WorkerUnavailable {
                name: thread_name,
                reason: err.to_string(),
            }
        })
}

/// Spawns a named OS thread that owns a current-thread Tokio runtime and
/// drives `run_loop` to completion on it.
pub fn spawn_runtime_thread<F, Fut>(
    thread_name: String,
    run_loop: F,
) -> Result<thread::JoinHandle<()>, BusError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + 'static,
{
    let worker_name = thread_name.clone();
    spawn_worker_thread(thread_name, move || {
        let runtime = match Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                error!(
                    event = events::RUNTIME_SPAWN_FAILED,
                    component = COMPONENT,
                    worker_thread = worker_name.as_str(),
                    err = %err,
                    "unable to build worker runtime"
                );
                return;
            }
        };

        runtime.block_on(run_loop());
    })
}

#[cfg(test)]
mod tests {
    use super::{
        build_thread_name, spawn_runtime_thread, spawn_worker_thread, DEFAULT_WORKER_THREAD_NAME,
        THREAD_NAME_MAX_LEN,
    };
    use std::sync::mpsc;

    #[test]
    fn build_thread_name_keeps_prefix_and_linux_safe_length() {
        let thread_name = build_thread_name("tb-drain-", "abcdef01-2345-6789");

        assert!(thread_name.starts_with("tb-drain-"));
        assert_eq!(thread_name.len(), THREAD_NAME_MAX_LEN);
    }

    #[test]
    fn build_thread_name_uses_fallback_for_unusable_ids() {
        assert_eq!(build_thread_name("tb-", "---"), DEFAULT_WORKER_THREAD_NAME);
        assert_eq!(
            build_thread_name("a-very-long-thread-prefix-", "abc"),
            DEFAULT_WORKER_THREAD_NAME
        );
    }

    #[test]
    fn worker_thread_carries_its_name() {
        let (tx, rx) = mpsc::channel();
        let handle = spawn_worker_thread("tb-test".to_string(), move || {
            let _ = tx.send(std::thread::current().name().map(str::to_string));
        })
        .expect("thread should spawn");

        handle.join().expect("thread should finish");
        assert_eq!(rx.recv().unwrap().as_deref(), Some("tb-test"));
    }

    #[test]
    fn runtime_thread_drives_future_to_completion() {
        let (tx, rx) = mpsc::channel();
        let handle = spawn_runtime_thread("tb-runtime".to_string(), move || async move {
            tokio::task::yield_now().await;
            let _ = tx.send(42);
        })
        .expect("runtime thread should spawn");

        handle.join().expect("runtime thread should finish");
        assert_eq!(rx.recv().unwrap(), 42);
    }
}
