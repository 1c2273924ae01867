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
use std::sync::mpsc::{self, Receiver};
use std::sync::Once;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

static LOGGING: Once = Once::new();
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Installs a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `info`.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Polls `condition` until it holds or `timeout` elapses. Returns the last result.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Outcome delivered to a command's answer callbacks.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandAnswer {
    pub result: bool,
    pub data: Value,
}

/// Success and error callbacks for `send_command` that report into one channel.
pub fn answer_channel() -> (
    impl FnOnce(Value) + Send + 'static,
    impl FnOnce(Value) + Send + 'static,
    Receiver<CommandAnswer>,
) {
    let (tx, rx) = mpsc::channel();
    let failed = tx.clone();
    (
        move |data| {
            let _ = tx.send(CommandAnswer { result: true, data });
        },
        move |data| {
            let _ = failed.send(CommandAnswer {
                result: false,
                data,
            });
        },
        rx,
    )
}
