//! Command names understood on the bus.
//!
//! Every command is answered with `(result, data | message)` through the
//! request-id correlated answer path.

// Panel configuration, served by the front-end collaborator.
pub const ADD_PANEL: &str = "ADD_PANEL";
pub const REMOVE_PANEL: &str = "REMOVE_PANEL";
pub const GET_PANEL_LIST: &str = "GET_PANEL_LIST";

// Alarm evaluator.
pub const GET_ALARMS: &str = "GET_ALARMS";
pub const ADD_ALARM: &str = "ADD_ALARM";
pub const REMOVE_ALARM: &str = "REMOVE_ALARM";
pub const CHANGE_ALARM_THRESHOLD: &str = "CHANGE_ALARM_THRESHOLD";
pub const REMOVE_ALL_EVENTS: &str = "REMOVE_ALL_EVENTS";

// Sensor storage.
pub const ADD_SENSOR_INFO: &str = "ADD_SENSOR_INFO";
pub const READ_SENSOR_INFO: &str = "READ_SENSOR_INFO";
pub const ERASE_SENSOR_INFO: &str = "ERASE_SENSOR_INFO";

// Ingestion adapter.
pub const CALIBRATION: &str = "CALIBRATION";
pub const SYSTEM_STATUS_REQUEST: &str = "SYSTEM_STATUS_REQUEST";

// Gateway manager.
pub const GET_GATEWAYS: &str = "GET_GATEWAYS";
pub const REQUEST_UPDATE_GATEWAYS: &str = "REQUEST_UPDATE_GATEWAYS";
