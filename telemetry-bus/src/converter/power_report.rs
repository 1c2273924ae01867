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

use std::collections::HashMap;

/// Power factor reported alongside every derived power value.
pub const DEFAULT_POWER_FACTOR: f64 = 86.7;

/// Electrical quantity a status contributes to the power calculation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Quantity {
    Current,
    Tension,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PowerSample {
    pub power: f64,
    pub power_factor: f64,
}

#[derive(Default)]
struct PhaseSample {
    current: Option<f64>,
    tension: Option<f64>,
}

/// Pairs current and tension values per `(gateway, indicator)`.
///
/// Once both halves of a pair are known a sample is produced and the pair is
/// cleared, so each value takes part in at most one sample.
#[derive(Default)]
pub struct PowerReport {
    phases: HashMap<(String, String), PhaseSample>,
}

impl PowerReport {
    pub fn record(
        &mut self,
        gateway: &str,
        indicator: &str,
        quantity: Quantity,
        value: f64,
    ) -> Option<PowerSample> {
        let key = (gateway.to_string(), indicator.to_string());
        let phase = self.phases.entry(key.clone()).or_default();

        match quantity {
            Quantity::Current => phase.current = Some(value),
            Quantity::Tension => phase.tension = Some(value),
        }

        let (Some(current), Some(tension)) = (phase.current, phase.tension) else {
            return None;
        };

        self.phases.remove(&key);
        Some(PowerSample {
            power: current * tension,
            power_factor: DEFAULT_POWER_FACTOR,
        })
    }
}
