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

//! Runs storage futures from synchronous code.
//!
//! One named thread owns a current-thread Tokio runtime. Any thread may
//! submit a future; it runs as an independent task on that runtime and its
//! output is handed to a completion callback on the bridge thread.

use super::error::StorageError;
use std::future::Future;
use std::pin::Pin;
use std::sync::{mpsc as std_mpsc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use telemetry_bus::runtime::spawn_runtime_thread;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error};

const COMPONENT: &str = "storage_bridge";
pub const DEFAULT_BRIDGE_THREAD_NAME: &str = "tb-storage";

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

pub struct AsyncBridge {
    jobs: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AsyncBridge {
    pub fn start(thread_name: &str) -> Result<Self, StorageError> {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let handle = spawn_runtime_thread(thread_name.to_string(), move || run_jobs(jobs_rx))?;

        Ok(Self {
            jobs: Mutex::new(Some(jobs_tx)),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Schedules `work` on the bridge runtime and passes its output to `on_done`.
    pub fn submit<Fut, T, C>(&self, work: Fut, on_done: C) -> Result<(), StorageError>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let job: Job = Box::pin(async move { on_done(work.await) });
        lock(&self.jobs)
            .as_ref()
            .ok_or(StorageError::BridgeClosed)?
            .send(job)
            .map_err(|_| StorageError::BridgeClosed)
    }

    /// Runs `work` on the bridge and blocks the caller until it finishes.
    ///
    /// Must not be called from the bridge thread itself.
    pub fn run_blocking<Fut, T>(&self, work: Fut) -> Result<T, StorageError>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = std_mpsc::sync_channel(1);
        self.submit(work, move |output| {
            let _ = done_tx.send(output);
        })?;
        done_rx.recv().map_err(|_| StorageError::BridgeClosed)
    }

    /// Stops accepting work, lets in-flight jobs finish and joins the thread
    /// unless called from it.
    pub fn shutdown(&self) {
        lock(&self.jobs).take();
        let Some(handle) = lock(&self.worker).take() else {
            return;
        };
        if handle.thread().id() == std::thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            error!(component = COMPONENT, "storage bridge thread ended with a panic");
        }
    }
}

impl Drop for AsyncBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_jobs(mut jobs: mpsc::UnboundedReceiver<Job>) {
    let mut running = JoinSet::new();
    loop {
        tokio::select! {
            next = jobs.recv() => match next {
                Some(job) => {
                    running.spawn(job);
                }
                None => break,
            },
            Some(finished) = running.join_next(), if !running.is_empty() => {
                if let Err(err) = finished {
                    error!(component = COMPONENT, err = %err, "storage job failed");
                }
            }
        }
    }

    while let Some(finished) = running.join_next().await {
        if let Err(err) = finished {
            error!(component = COMPONENT, err = %err, "storage job failed");
        }
    }
    debug!(component = COMPONENT, "storage bridge stopped");
}

#[cfg(test)]
mod tests {
    use super::AsyncBridge;
    use crate::storage::error::StorageError;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn work_runs_off_the_calling_thread() {
        let bridge = AsyncBridge::start("tb-bridge-test").unwrap();
        let caller = std::thread::current().id();

        let worker = bridge
            .run_blocking(async { std::thread::current().id() })
            .unwrap();
        assert_ne!(worker, caller);
    }

    #[test]
    fn completion_callback_receives_the_output() {
        let bridge = AsyncBridge::start("tb-bridge-test").unwrap();
        let (tx, rx) = mpsc::channel();

        bridge
            .submit(async { 40 + 2 }, move |answer| tx.send(answer).unwrap())
            .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    }

    #[test]
    fn submitting_after_shutdown_fails() {
        let bridge = AsyncBridge::start("tb-bridge-test").unwrap();
        bridge.shutdown();

        assert!(matches!(
            bridge.submit(async {}, |()| {}),
            Err(StorageError::BridgeClosed)
        ));
    }
}
