mod config_store;
mod error;
mod evaluator;
mod model;
mod sqlite_store;

pub use config_store::{AlarmConfigStore, MemoryAlarmStore};
pub use error::AlarmError;
pub use evaluator::{AlarmEvaluator, DEFAULT_QUEUE_CAPACITY};
pub use model::{Alarm, AlarmEvent, Comparison};
pub use sqlite_store::SqliteAlarmStore;
