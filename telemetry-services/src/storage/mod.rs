mod async_bridge;
mod error;
mod sqlite;
mod store;
mod write_queue;

pub use async_bridge::{AsyncBridge, DEFAULT_BRIDGE_THREAD_NAME};
pub use error::StorageError;
pub use sqlite::SqliteSensorStore;
pub use store::{MemorySensorStore, SensorQuery, SensorStore, DEFAULT_RETENTION_DAYS};
pub use write_queue::{
    StorageSettings, StorageWriteQueue, DEFAULT_FLUSH_INTERVAL, DEFAULT_STORAGE_PATTERN,
};
