//! Runtime integration layer.
//!
//! Isolates thread and Tokio runtime construction so the rest of the workspace
//! only deals with queues and callbacks.

pub mod worker_runtime;

pub use worker_runtime::{build_thread_name, spawn_runtime_thread, spawn_worker_thread};
