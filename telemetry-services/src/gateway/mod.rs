mod manager;
mod status_map;

pub use manager::GatewayManager;
pub use status_map::{GatewayStatusMap, DEFAULT_GATEWAY_CAPACITY};
