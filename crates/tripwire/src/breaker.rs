// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;

use crate::callbacks::{OnClosed, OnOpened, OnProbing};
use crate::engine::{CircuitEngine, Engine, EnterCircuitResult, ExecutionMode, ExecutionResult, ExitCircuitResult};
use crate::{CircuitBreakerBuilder, CircuitOpenError, CircuitState, ConfigError, Error, OnClosedArgs, OnOpenedArgs, OnProbingArgs};

/// Guards calls to an unreliable dependency by counting consecutive failures.
///
/// While the circuit is [`Closed`][CircuitState::Closed], calls run normally. Once
/// `failure_threshold` consecutive calls fail, the circuit opens and every call is rejected
/// with [`Error::Open`] without running the operation. After `reset_timeout`, the next call
/// runs as a single probe: success closes the circuit, failure opens it again.
///
/// `CircuitBreaker` is cheap to clone. Clones share the same state, so create one instance
/// per guarded dependency and hand clones to every caller.
///
/// # Examples
///
/// ```
/// # use std::time::Duration;
/// # use tick::Clock;
/// # use tripwire::{CircuitBreaker, Error};
/// # fn example(clock: &Clock) -> Result<(), tripwire::ConfigError> {
/// let breaker = CircuitBreaker::new(3, Duration::from_secs(5), clock)?;
///
/// match breaker.execute(|| "42".parse::<u32>()) {
///     Ok(value) => println!("got {value}"),
///     Err(Error::Open(rejected)) => println!("skipped, retry after {:?}", rejected.retry_after()),
///     Err(Error::Operation(error)) => println!("failed: {error}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    pub(crate) shared: Arc<BreakerShared>,
}

/// State shared by all clones of a [`CircuitBreaker`].
#[derive(Debug)]
pub(crate) struct BreakerShared {
    pub(crate) name: Cow<'static, str>,
    pub(crate) engine: Engine,
    pub(crate) on_opened: Option<OnOpened>,
    pub(crate) on_closed: Option<OnClosed>,
    pub(crate) on_probing: Option<OnProbing>,
}

impl CircuitBreaker {
    /// Creates a circuit breaker with the given threshold and reset timeout.
    ///
    /// Use [`CircuitBreaker::builder`] to configure a name, callbacks, or telemetry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `failure_threshold` is 0 or `reset_timeout` is zero.
    pub fn new(failure_threshold: u32, reset_timeout: Duration, clock: impl AsRef<Clock>) -> Result<Self, ConfigError> {
        Self::builder(clock)
            .failure_threshold(failure_threshold)
            .reset_timeout(reset_timeout)
            .build()
    }

    /// Creates a builder for a circuit breaker that reads time from `clock`.
    pub fn builder(clock: impl AsRef<Clock>) -> CircuitBreakerBuilder {
        CircuitBreakerBuilder::new(clock.as_ref())
    }

    /// Runs `operation` through the circuit breaker.
    ///
    /// The operation is invoked at most once. It is not invoked at all when the call is
    /// rejected, in which case [`Error::Open`] is returned. An `Err` returned by the
    /// operation counts as a failure and is passed back verbatim as [`Error::Operation`].
    ///
    /// If the operation panics, the panic propagates and the outcome is not recorded.
    /// A panicking probe frees the probe slot for the next caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Open`] if the call was rejected, or [`Error::Operation`] if the
    /// operation failed.
    pub fn execute<T, E>(&self, operation: impl FnOnce() -> Result<T, E>) -> Result<T, Error<E>> {
        let attempt = self.shared.before_execute()?;

        let result = operation();
        attempt.complete(&result);

        result.map_err(Error::Operation)
    }

    /// Runs the future created by `operation` through the circuit breaker.
    ///
    /// Behaves like [`execute`][Self::execute]. The admission decision is made when the
    /// returned future is first polled and no lock is held across the operation's await point.
    /// Dropping the future before it completes leaves the failure count untouched and frees
    /// the probe slot if this call was the probe.
    ///
    /// The circuit breaker imposes no timeout. Wrap the operation in one (for example
    /// `tokio::time::timeout`) and map the elapsed error into `E` so that it counts as a failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Open`] if the call was rejected, or [`Error::Operation`] if the
    /// operation failed.
    pub async fn execute_async<T, E, F, Fut>(&self, operation: F) -> Result<T, Error<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempt = self.shared.before_execute()?;

        let result = operation().await;
        attempt.complete(&result);

        result.map_err(Error::Operation)
    }

    /// Returns the state the circuit was left in by the most recent call.
    ///
    /// The transition out of [`Open`][CircuitState::Open] happens lazily when a call arrives,
    /// so an idle circuit reports `Open` even after its reset timeout has elapsed.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.shared.engine.snapshot().state
    }

    /// Returns the number of consecutive failures recorded since the circuit last closed.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.shared.engine.snapshot().failure_count
    }

    /// Returns the name of the circuit breaker.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

impl BreakerShared {
    pub(crate) fn before_execute(self: &Arc<Self>) -> Result<Attempt, CircuitOpenError> {
        match self.engine.enter() {
            EnterCircuitResult::Accepted { mode, generation } => {
                // Guard first, so that a panicking callback still releases the probe.
                let attempt = Attempt {
                    shared: Arc::clone(self),
                    mode,
                    generation,
                    completed: false,
                };

                if mode == ExecutionMode::Probe {
                    self.invoke_on_probing();
                }

                Ok(attempt)
            }
            EnterCircuitResult::Rejected { retry_after } => Err(CircuitOpenError::new(retry_after)),
        }
    }

    fn after_execute(&self, result: ExecutionResult, mode: ExecutionMode, generation: u64) {
        match self.engine.exit(result, mode, generation) {
            ExitCircuitResult::Unchanged | ExitCircuitResult::Reopened { .. } => {}
            ExitCircuitResult::Opened { failure_count } => self.invoke_on_opened(failure_count),
            ExitCircuitResult::Closed { open_duration, .. } => self.invoke_on_closed(open_duration),
        }
    }

    fn invoke_on_probing(&self) {
        if let Some(on_probing) = &self.on_probing {
            on_probing.call(OnProbingArgs { name: &self.name });
        }
    }

    fn invoke_on_opened(&self, failure_count: u32) {
        if let Some(on_opened) = &self.on_opened {
            on_opened.call(OnOpenedArgs {
                name: &self.name,
                failure_count,
            });
        }
    }

    fn invoke_on_closed(&self, open_duration: Duration) {
        if let Some(on_closed) = &self.on_closed {
            on_closed.call(OnClosedArgs {
                name: &self.name,
                open_duration,
            });
        }
    }
}

/// An admitted execution that has not reported its outcome yet.
///
/// Dropping it without calling [`complete`][Attempt::complete] abandons the execution.
#[derive(Debug)]
pub(crate) struct Attempt {
    shared: Arc<BreakerShared>,
    mode: ExecutionMode,
    generation: u64,
    completed: bool,
}

impl Attempt {
    pub(crate) fn complete<T, E>(mut self, result: &Result<T, E>) {
        self.completed = true;
        self.shared
            .after_execute(ExecutionResult::from_result(result), self.mode, self.generation);
    }
}

impl Drop for Attempt {
    fn drop(&mut self) {
        if !self.completed {
            self.shared.engine.abandon(self.mode);
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use futures::FutureExt;
    use static_assertions::assert_impl_all;
    use tick::ClockControl;

    use super::*;
    use crate::testing::LogCapture;

    const RESET_TIMEOUT: Duration = Duration::from_secs(5);

    fn create_breaker(control: &ClockControl) -> CircuitBreaker {
        CircuitBreaker::new(2, RESET_TIMEOUT, control.to_clock()).unwrap()
    }

    fn trip(breaker: &CircuitBreaker) {
        while breaker.state() == CircuitState::Closed {
            let _ = breaker.execute(|| Err::<(), _>("boom"));
        }
    }

    #[test]
    fn thread_safe_types() {
        assert_impl_all!(CircuitBreaker: Send, Sync, Clone, std::fmt::Debug);
    }

    #[test]
    fn execute_async_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let breaker = CircuitBreaker::new(1, RESET_TIMEOUT, Clock::new_frozen()).unwrap();
        let future = breaker.execute_async(|| async { Ok::<_, String>(1) });

        assert_send(&future);
    }

    #[test]
    fn execute_success_returns_value() {
        let breaker = create_breaker(&ClockControl::new());

        assert_eq!(breaker.execute(|| Ok::<_, String>(7)).unwrap(), 7);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn execute_failure_passes_error_through() {
        let breaker = create_breaker(&ClockControl::new());

        let error = breaker.execute(|| Err::<(), _>("boom")).unwrap_err();

        assert_eq!(error.into_operation_error(), Some("boom"));
        assert_eq!(breaker.failure_count(), 1);
    }

    #[test]
    fn rejected_call_reports_retry_after() {
        let control = ClockControl::new();
        let breaker = create_breaker(&control);
        trip(&breaker);

        control.advance(Duration::from_secs(1));
        let error = breaker.execute(|| Ok::<_, String>(())).unwrap_err();

        match error {
            Error::Open(rejected) => assert_eq!(rejected.retry_after(), Some(Duration::from_secs(4))),
            Error::Operation(error) => panic!("operation must not run, got {error}"),
        }
    }

    #[test]
    fn panicking_probe_releases_slot() {
        let control = ClockControl::new();
        let breaker = create_breaker(&control);
        trip(&breaker);
        control.advance(RESET_TIMEOUT);

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            let _ = breaker.execute(|| -> Result<(), String> { panic!("probe exploded") });
        }));
        assert!(panicked.is_err());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        assert!(breaker.execute(|| Ok::<_, String>(())).is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn panicking_normal_call_is_not_counted() {
        let breaker = create_breaker(&ClockControl::new());
        let _ = breaker.execute(|| Err::<(), _>("boom"));

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            let _ = breaker.execute(|| -> Result<(), String> { panic!("exploded") });
        }));

        assert!(panicked.is_err());
        assert_eq!(breaker.failure_count(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn dropped_async_probe_releases_slot() {
        let control = ClockControl::new();
        let breaker = create_breaker(&control);
        trip(&breaker);
        control.advance(RESET_TIMEOUT);

        let mut probe = Box::pin(breaker.execute_async(|| std::future::pending::<Result<(), String>>()));
        assert!((&mut probe).now_or_never().is_none());

        // The probe is in flight, so other callers are rejected.
        let rejected = breaker.execute(|| Ok::<_, String>(())).unwrap_err();
        assert!(rejected.is_open());

        drop(probe);

        assert!(breaker.execute(|| Ok::<_, String>(())).is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn unpolled_async_call_does_not_enter() {
        let control = ClockControl::new();
        let breaker = create_breaker(&control);
        trip(&breaker);
        control.advance(RESET_TIMEOUT);

        let never_polled = breaker.execute_async(|| async { Ok::<_, String>(()) });
        drop(never_polled);

        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn callbacks_invoked_on_transitions() {
        let control = ClockControl::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let (opened, probing, closed) = (Arc::clone(&events), Arc::clone(&events), Arc::clone(&events));

        let breaker = CircuitBreaker::builder(control.to_clock())
            .name("inventory")
            .failure_threshold(2)
            .reset_timeout(RESET_TIMEOUT)
            .on_opened(move |args| opened.lock().unwrap().push(format!("opened:{}:{}", args.name(), args.failure_count())))
            .on_probing(move |args| probing.lock().unwrap().push(format!("probing:{}", args.name())))
            .on_closed(move |args| closed.lock().unwrap().push(format!("closed:{}", args.open_duration().as_secs())))
            .build()
            .unwrap();

        trip(&breaker);
        control.advance(Duration::from_secs(6));
        breaker.execute(|| Ok::<_, String>(())).unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec!["opened:inventory:2", "probing:inventory", "closed:6"]
        );
    }

    #[test]
    fn failed_probe_does_not_invoke_on_opened_again() {
        let control = ClockControl::new();
        let opened = Arc::new(AtomicU32::new(0));
        let opened_clone = Arc::clone(&opened);

        let breaker = CircuitBreaker::builder(control.to_clock())
            .failure_threshold(1)
            .on_opened(move |_| {
                opened_clone.fetch_add(1, Ordering::Relaxed);
            })
            .build()
            .unwrap();

        trip(&breaker);
        control.advance(Duration::from_secs(5));
        let _ = breaker.execute(|| Err::<(), _>("still down"));

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(opened.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn panicking_on_probing_callback_releases_slot() {
        let control = ClockControl::new();
        let armed = AtomicBool::new(true);
        let breaker = CircuitBreaker::builder(control.to_clock())
            .failure_threshold(1)
            .on_probing(move |_| assert!(!armed.swap(false, Ordering::Relaxed), "callback exploded"))
            .build()
            .unwrap();
        trip(&breaker);
        control.advance(Duration::from_secs(5));

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            let _ = breaker.execute(|| Ok::<_, String>(()));
        }));

        assert!(panicked.is_err());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.execute(|| Ok::<_, String>(())).is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn logs_emitted_for_breaker_lifecycle() {
        let control = ClockControl::new();
        let capture = LogCapture::new();
        let breaker = CircuitBreaker::builder(control.to_clock())
            .name("log_test_circuit")
            .failure_threshold(1)
            .enable_logs()
            .build()
            .unwrap();

        tracing::subscriber::with_default(capture.subscriber(), || {
            let _ = breaker.execute(|| Err::<(), _>("boom"));
            let _ = breaker.execute(|| Ok::<_, String>(()));
            control.advance(RESET_TIMEOUT);
            let _ = breaker.execute(|| Ok::<_, String>(()));
        });

        capture.assert_contains("tripwire::engine");
        capture.assert_contains("log_test_circuit");
        capture.assert_contains("circuit_breaker.state=\"open\"");
        capture.assert_contains("circuit_breaker.probe.result=\"success\"");
        capture.assert_contains("circuit_breaker.state=\"closed\"");
        capture.assert_contains("circuit_breaker.open.duration=5");
    }
}
