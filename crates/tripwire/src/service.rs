// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::{CircuitBreaker, Error};

/// A [`tower_layer::Layer`] that wraps services with a shared [`CircuitBreaker`].
///
/// All services produced by the layer, and all their clones, report to the same breaker.
///
/// ```
/// # use std::time::Duration;
/// # use tick::Clock;
/// # use tower_layer::Layer;
/// # use tripwire::{CircuitBreaker, CircuitBreakerLayer};
/// # fn example<S>(clock: &Clock, service: S) -> Result<(), tripwire::ConfigError> {
/// let breaker = CircuitBreaker::new(3, Duration::from_secs(5), clock)?;
/// let service = CircuitBreakerLayer::new(breaker).layer(service);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreakerLayer {
    breaker: CircuitBreaker,
}

impl CircuitBreakerLayer {
    /// Creates a layer that routes every request through `breaker`.
    #[must_use]
    pub fn new(breaker: CircuitBreaker) -> Self {
        Self { breaker }
    }

    /// Returns the circuit breaker shared by the wrapped services.
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<S> tower_layer::Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreakerService {
            breaker: self.breaker.clone(),
            inner,
        }
    }
}

/// A tower service guarded by a [`CircuitBreaker`].
///
/// Requests are rejected with [`Error::Open`] while the circuit is open. Errors from the inner
/// service count as failures and surface as [`Error::Operation`]. Readiness errors from
/// `poll_ready` are passed through as [`Error::Operation`] without being counted.
#[derive(Debug, Clone)]
pub struct CircuitBreakerService<S> {
    breaker: CircuitBreaker,
    inner: S,
}

impl<S> CircuitBreakerService<S> {
    /// Returns the circuit breaker guarding this service.
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

/// Future returned by [`CircuitBreakerService`].
pub struct ResponseFuture<Res, Err> {
    inner: Pin<Box<dyn Future<Output = Result<Res, Error<Err>>> + Send>>,
}

impl<Res, Err> Debug for ResponseFuture<Res, Err> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseFuture").finish_non_exhaustive()
    }
}

impl<Res, Err> Future for ResponseFuture<Res, Err> {
    type Output = Result<Res, Error<Err>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<Req, S> tower_service::Service<Req> for CircuitBreakerService<S>
where
    S: tower_service::Service<Req>,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = Error<S::Error>;
    type Future = ResponseFuture<S::Response, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Error::Operation)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let attempt = match self.breaker.shared.before_execute() {
            Ok(attempt) => attempt,
            Err(rejected) => {
                return ResponseFuture {
                    inner: Box::pin(std::future::ready(Err(Error::Open(rejected)))),
                };
            }
        };

        let future = self.inner.call(req);

        ResponseFuture {
            inner: Box::pin(async move {
                let result = future.await;
                attempt.complete(&result);
                result.map_err(Error::Operation)
            }),
        }
    }
}
