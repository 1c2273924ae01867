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

mod integration_test_utils;
pub use integration_test_utils::{answer_channel, init_logging, wait_for, CommandAnswer};

mod integration_test_listeners;
pub use integration_test_listeners::{RecordedStatus, RecordingSubscriber};

mod loopback_wire;
pub use loopback_wire::{loopback_wire, LoopbackBroker, LoopbackWire};
