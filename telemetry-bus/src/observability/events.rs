//! Canonical structured event names used across the telemetry workspace.

// Bus fan-out events.
pub const BUS_CONSUMER_ATTACHED: &str = "bus_consumer_attached";
pub const BUS_PUBLISH_NO_CONSUMERS: &str = "bus_publish_no_consumers";
pub const BUS_CONSUMER_PRUNED: &str = "bus_consumer_pruned";

// Consumer facade events.
pub const FACADE_SUBSCRIBE: &str = "facade_subscribe";
pub const FACADE_UNSUBSCRIBE: &str = "facade_unsubscribe";
pub const FACADE_UNSUBSCRIBE_NOT_FOUND: &str = "facade_unsubscribe_not_found";
pub const FACADE_COMMAND_SENT: &str = "facade_command_sent";
pub const FACADE_COMMAND_UNHANDLED: &str = "facade_command_unhandled";
pub const FACADE_ANSWER_MATCHED: &str = "facade_answer_matched";
pub const FACADE_REQUEST_EXPIRED: &str = "facade_request_expired";
pub const FACADE_CALLBACK_PANICKED: &str = "facade_callback_panicked";
pub const FACADE_DRAIN_START: &str = "facade_drain_start";
pub const FACADE_DRAIN_STOP: &str = "facade_drain_stop";

// Ingestion events.
pub const INGEST_STATE_CHANGE: &str = "ingest_state_change";
pub const INGEST_RECEIVE: &str = "ingest_receive";
pub const INGEST_QUEUE_FULL: &str = "ingest_queue_full";
pub const INGEST_TRANSLATE_FAILED: &str = "ingest_translate_failed";
pub const INGEST_PUBLISH: &str = "ingest_publish";
pub const INGEST_CONNECTION_FAILED: &str = "ingest_connection_failed";
pub const INGEST_GATEWAY_COMMAND: &str = "ingest_gateway_command";

// Alarm evaluation events.
pub const ALARM_SETUP: &str = "alarm_setup";
pub const ALARM_REMOVED: &str = "alarm_removed";
pub const ALARM_TRIGGERED: &str = "alarm_triggered";
pub const ALARM_QUEUE_FULL: &str = "alarm_queue_full";
pub const ALARM_PERSIST_FAILED: &str = "alarm_persist_failed";

// Storage events.
pub const STORAGE_BATCH_FLUSH: &str = "storage_batch_flush";
pub const STORAGE_BATCH_FAILED: &str = "storage_batch_failed";
pub const STORAGE_QUERY_FAILED: &str = "storage_query_failed";
pub const STORAGE_INDEXES_READY: &str = "storage_indexes_ready";
pub const STORAGE_PAYLOAD_IGNORED: &str = "storage_payload_ignored";

// Gateway tracking events.
pub const GATEWAY_STATUS_UPDATE: &str = "gateway_status_update";
pub const GATEWAY_STATUS_EVICTED: &str = "gateway_status_evicted";

// Runtime events.
pub const RUNTIME_SPAWN_START: &str = "runtime_spawn_start";
pub const RUNTIME_SPAWN_OK: &str = "runtime_spawn_ok";
pub const RUNTIME_SPAWN_FAILED: &str = "runtime_spawn_failed";
pub const RUNTIME_THREAD_NAME_FALLBACK: &str = "runtime_thread_name_fallback";
