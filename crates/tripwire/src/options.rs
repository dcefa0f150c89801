// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::ConfigError;
use crate::constants::{DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT};

/// How the open-state clock is treated when a probe call fails.
///
/// A failed probe always sends the circuit back to [`Open`][crate::CircuitState::Open]. The
/// policy decides from which point in time the reset timeout is measured afterwards.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(any(feature = "serde", test), serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum ProbeFailurePolicy {
    /// The reset timeout restarts at the moment the probe failed (default).
    #[default]
    RestartBreak,

    /// The reset timeout keeps counting from when the circuit first opened.
    ///
    /// Because that timeout has already elapsed, the next call after a failed probe is
    /// admitted as a new probe right away. Use this to keep probing a dependency that is
    /// called rarely, at the cost of sending it one call per incoming request.
    PreserveOpenedAt,
}

/// Plain configuration data for a [`CircuitBreaker`][crate::CircuitBreaker].
///
/// Apply it with [`CircuitBreakerBuilder::options`][crate::CircuitBreakerBuilder::options].
/// With the `serde` feature enabled, the options can be loaded from any serde format.
/// Durations are written as human-readable strings such as `"5s"`, `"1m 30s"`, or `"PT5S"`.
///
/// ```
/// # use std::time::Duration;
/// # use tripwire::BreakerOptions;
/// let mut options = BreakerOptions::default();
/// options.failure_threshold = 3;
/// options.reset_timeout = Duration::from_secs(10);
///
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(any(feature = "serde", test), serde(default, deny_unknown_fields))]
#[non_exhaustive]
pub struct BreakerOptions {
    /// Number of consecutive failures that trips the circuit. Must be at least 1.
    ///
    /// **Default**: 5
    pub failure_threshold: u32,

    /// Minimum time the circuit stays open before a probe is admitted. Must be non-zero.
    ///
    /// **Default**: 5 seconds
    #[cfg_attr(any(feature = "serde", test), serde(with = "duration_serde"))]
    pub reset_timeout: Duration,

    /// What happens to the open-state clock when a probe fails.
    ///
    /// **Default**: [`ProbeFailurePolicy::RestartBreak`]
    pub probe_failure_policy: ProbeFailurePolicy,
}

impl BreakerOptions {
    /// Checks that the options describe a usable circuit breaker.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroFailureThreshold`] if the threshold is 0, or
    /// [`ConfigError::ZeroResetTimeout`] if the reset timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }

        if self.reset_timeout.is_zero() {
            return Err(ConfigError::ZeroResetTimeout);
        }

        Ok(())
    }
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            probe_failure_policy: ProbeFailurePolicy::default(),
        }
    }
}

#[cfg(any(feature = "serde", test))]
mod duration_serde {
    use std::time::Duration;

    use jiff::SignedDuration;
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let duration = SignedDuration::try_from(*value).map_err(S::Error::custom)?;
        serializer.collect_str(&format_args!("{duration:#}"))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        let duration: SignedDuration = text.parse().map_err(D::Error::custom)?;
        Duration::try_from(duration).map_err(D::Error::custom)
    }
}
