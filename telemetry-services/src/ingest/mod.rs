//! Wire protocol ingestion.
//!
//! Raw wire messages are translated into canonical readings, calibration
//! updates and gateway statuses, then published on the bus.

pub mod adapter;
pub mod error;
pub mod io_cloud;
pub mod translator;
pub mod wire;

pub use adapter::{AdapterState, IngestConfig, IngestionAdapter};
pub use error::{IngestError, TranslateError};
pub use io_cloud::IoCloudTranslator;
pub use translator::{translate_payload, DirectTranslator, PayloadTranslator, Translated, WireAction};
pub use wire::{MqttSettings, MqttWire, WireMessage, WirePublisher, WireSession};
