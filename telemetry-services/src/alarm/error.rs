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

use telemetry_bus::BusError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("alarm {0} not found")]
    NotFound(i64),

    #[error("invalid alarm request: {0}")]
    InvalidRequest(String),

    #[error("alarm store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(transparent)]
    Bus(#[from] BusError),
}

impl From<rusqlite::Error> for AlarmError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AlarmError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}
