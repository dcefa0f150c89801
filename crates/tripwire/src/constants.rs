// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Name reported in telemetry when the breaker is not given one.
pub(crate) const DEFAULT_NAME: &str = "default";

/// Default number of consecutive failures that trips the circuit.
pub(crate) const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default duration that the circuit stays open before a probe is let through.
pub(crate) const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) const ERR_POISONED_LOCK: &str =
    "poisoned lock - cannot continue execution because the circuit state can no longer be trusted";
