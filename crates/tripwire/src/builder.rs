// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;

use crate::breaker::BreakerShared;
use crate::callbacks::{OnClosed, OnOpened, OnProbing};
use crate::constants::DEFAULT_NAME;
use crate::engine::{Engine, EngineCore, EngineOptions, EngineTelemetry};
use crate::telemetry::TelemetryHelper;
use crate::{BreakerOptions, CircuitBreaker, ConfigError, OnClosedArgs, OnOpenedArgs, OnProbingArgs, ProbeFailurePolicy};

/// Builder for configuring a [`CircuitBreaker`].
///
/// Created by [`CircuitBreaker::builder`]. Every setting has a default, so the
/// smallest configuration is `CircuitBreaker::builder(&clock).build()`.
///
/// # Examples
///
/// ```
/// # use std::time::Duration;
/// # use tick::Clock;
/// # use tripwire::CircuitBreaker;
/// # fn example(clock: &Clock) -> Result<(), tripwire::ConfigError> {
/// let breaker = CircuitBreaker::builder(clock)
///     .name("inventory")
///     .failure_threshold(3)
///     .reset_timeout(Duration::from_secs(10))
///     .on_opened(|args| println!("{} opened after {} failures", args.name(), args.failure_count()))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CircuitBreakerBuilder {
    clock: Clock,
    name: Cow<'static, str>,
    options: BreakerOptions,
    on_opened: Option<OnOpened>,
    on_closed: Option<OnClosed>,
    on_probing: Option<OnProbing>,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<opentelemetry::metrics::Meter>,
    #[cfg(any(feature = "logs", test))]
    logs_enabled: bool,
}

impl CircuitBreakerBuilder {
    pub(crate) fn new(clock: &Clock) -> Self {
        Self {
            clock: clock.clone(),
            name: Cow::Borrowed(DEFAULT_NAME),
            options: BreakerOptions::default(),
            on_opened: None,
            on_closed: None,
            on_probing: None,
            #[cfg(any(feature = "metrics", test))]
            meter: None,
            #[cfg(any(feature = "logs", test))]
            logs_enabled: false,
        }
    }

    /// Sets the name of the circuit breaker. Prefer `snake_case`.
    ///
    /// The name is passed to callbacks and attached to logs and metrics.
    ///
    /// **Default**: `"default"`
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the number of consecutive failures that trips the circuit.
    ///
    /// Any success while closed resets the count. The value must be at least 1,
    /// otherwise [`build`][Self::build] fails with [`ConfigError::ZeroFailureThreshold`].
    ///
    /// **Default**: 5
    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.options.failure_threshold = threshold;
        self
    }

    /// Sets the minimum time the circuit stays open before a probe is admitted.
    ///
    /// There is no background timer. The timeout is checked when the next call arrives,
    /// so an idle open circuit stays open. The value must be non-zero, otherwise
    /// [`build`][Self::build] fails with [`ConfigError::ZeroResetTimeout`].
    ///
    /// **Default**: 5 seconds
    #[must_use]
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.options.reset_timeout = timeout;
        self
    }

    /// Sets how the reset timeout is measured after a failed probe.
    ///
    /// **Default**: [`ProbeFailurePolicy::RestartBreak`]
    #[must_use]
    pub fn probe_failure_policy(mut self, policy: ProbeFailurePolicy) -> Self {
        self.options.probe_failure_policy = policy;
        self
    }

    /// Applies all settings from the given [`BreakerOptions`].
    ///
    /// Values set by earlier calls to [`failure_threshold`][Self::failure_threshold],
    /// [`reset_timeout`][Self::reset_timeout], or
    /// [`probe_failure_policy`][Self::probe_failure_policy] are replaced.
    #[must_use]
    pub fn options(mut self, options: BreakerOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the callback invoked when the circuit trips from closed to open.
    ///
    /// The callback runs on the thread whose failure tripped the circuit, after the
    /// state lock is released.
    ///
    /// **Default**: No callback
    #[must_use]
    pub fn on_opened(mut self, callback: impl Fn(OnOpenedArgs<'_>) + Send + Sync + 'static) -> Self {
        self.on_opened = Some(OnOpened::new(callback));
        self
    }

    /// Sets the callback invoked when a successful probe closes the circuit.
    ///
    /// **Default**: No callback
    #[must_use]
    pub fn on_closed(mut self, callback: impl Fn(OnClosedArgs<'_>) + Send + Sync + 'static) -> Self {
        self.on_closed = Some(OnClosed::new(callback));
        self
    }

    /// Sets the callback invoked right before a probe call is executed.
    ///
    /// **Default**: No callback
    #[must_use]
    pub fn on_probing(mut self, callback: impl Fn(OnProbingArgs<'_>) + Send + Sync + 'static) -> Self {
        self.on_probing = Some(OnProbing::new(callback));
        self
    }

    /// Enables metrics reporting with the given OpenTelemetry meter provider.
    ///
    /// Circuit transitions, rejections, and probes are reported through the
    /// `resilience.event` counter.
    #[must_use]
    #[cfg(any(feature = "metrics", test))]
    pub fn enable_metrics(mut self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        self.meter = Some(crate::telemetry::create_meter(provider));
        self
    }

    /// Enables structured logging of circuit events through `tracing`.
    #[must_use]
    #[cfg(any(feature = "logs", test))]
    pub fn enable_logs(mut self) -> Self {
        self.logs_enabled = true;
        self
    }

    /// Validates the configuration and creates the circuit breaker.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the failure threshold is 0 or the reset timeout is zero.
    pub fn build(self) -> Result<CircuitBreaker, ConfigError> {
        self.options.validate()?;

        let telemetry = self.create_telemetry();
        let engine: Engine = EngineTelemetry::new(
            EngineCore::new(
                EngineOptions {
                    failure_threshold: self.options.failure_threshold,
                    reset_timeout: self.options.reset_timeout,
                    probe_failure_policy: self.options.probe_failure_policy,
                },
                self.clock,
            ),
            telemetry,
        );

        Ok(CircuitBreaker {
            shared: Arc::new(BreakerShared {
                name: self.name,
                engine,
                on_opened: self.on_opened,
                on_closed: self.on_closed,
                on_probing: self.on_probing,
            }),
        })
    }

    fn create_telemetry(&self) -> TelemetryHelper {
        TelemetryHelper {
            #[cfg(any(feature = "metrics", feature = "logs", test))]
            name: self.name.clone(),
            #[cfg(any(feature = "metrics", test))]
            event_reporter: self.meter.as_ref().map(crate::telemetry::create_resilience_event_counter),
            #[cfg(any(feature = "logs", test))]
            logs_enabled: self.logs_enabled,
        }
    }
}
