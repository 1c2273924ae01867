//! Structured logging vocabulary shared by every crate in the workspace.
//!
//! Library code only emits `tracing` events; installing a subscriber is left to
//! binaries and tests.

pub mod events;
pub mod fields;
