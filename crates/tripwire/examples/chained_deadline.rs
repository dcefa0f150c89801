// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Places orders by calling two slow dependencies, each behind its own circuit breaker.
//!
//! Inventory takes about two seconds and payment about three, while the whole order must
//! finish within five. The remaining deadline is propagated into every call. A call that
//! runs out of time is mapped into the call's error type, so the breaker counts it as a
//! failure; once the payment breaker opens, orders fail fast instead of waiting.

use std::fmt::{self, Display};
use std::time::Duration;

use tick::Clock;
use tokio::time::Instant;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tripwire::{CircuitBreaker, Error};

const ORDER_DEADLINE: Duration = Duration::from_secs(5);
const INVENTORY_LATENCY: Duration = Duration::from_secs(2);
const PAYMENT_LATENCY: Duration = Duration::from_secs(3);

#[derive(Debug)]
enum CallError {
    TimedOut(&'static str),
    Failed(String),
}

impl Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut(dependency) => write!(f, "{dependency} call timed out"),
            Self::Failed(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for CallError {}

struct OrderHandler {
    inventory: CircuitBreaker,
    payment: CircuitBreaker,
}

impl OrderHandler {
    fn new(clock: &Clock) -> Result<Self, tripwire::ConfigError> {
        Ok(Self {
            inventory: CircuitBreaker::builder(clock)
                .name("inventory")
                .failure_threshold(2)
                .reset_timeout(Duration::from_secs(10))
                .enable_logs()
                .build()?,
            payment: CircuitBreaker::builder(clock)
                .name("payment")
                .failure_threshold(2)
                .reset_timeout(Duration::from_secs(10))
                .enable_logs()
                .build()?,
        })
    }

    async fn place_order(&self, order: u32) -> Result<String, Error<CallError>> {
        let deadline = Instant::now() + ORDER_DEADLINE;

        let reserved = self
            .inventory
            .execute_async(|| within_deadline("inventory", deadline, reserve_items(order)))
            .await?;

        let receipt = self
            .payment
            .execute_async(|| within_deadline("payment", deadline, charge(order)))
            .await?;

        Ok(format!("order {order}: {reserved}, {receipt}"))
    }
}

async fn within_deadline<T>(
    dependency: &'static str,
    deadline: Instant,
    call: impl Future<Output = Result<T, CallError>>,
) -> Result<T, CallError> {
    tokio::time::timeout_at(deadline, call)
        .await
        .map_err(|_elapsed| CallError::TimedOut(dependency))?
}

// Latency varies by up to half a second around the nominal value.
fn jitter(nominal: Duration) -> Duration {
    nominal.saturating_sub(Duration::from_millis(250)) + Duration::from_millis(fastrand::u64(0..500))
}

async fn reserve_items(order: u32) -> Result<String, CallError> {
    tokio::time::sleep(jitter(INVENTORY_LATENCY)).await;
    Ok(format!("items reserved for {order}"))
}

async fn charge(order: u32) -> Result<String, CallError> {
    tokio::time::sleep(jitter(PAYMENT_LATENCY)).await;

    if fastrand::u8(0..10) == 0 {
        Err(CallError::Failed(format!("card declined for {order}")))
    } else {
        Ok(format!("payment captured for {order}"))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    let clock = Clock::new_tokio();
    let handler = OrderHandler::new(&clock)?;

    for order in 0..8 {
        let started = Instant::now();

        match handler.place_order(order).await {
            Ok(summary) => println!("{summary}"),
            Err(Error::Open(rejected)) => println!("order {order}: rejected, {rejected}"),
            Err(Error::Operation(error)) => println!("order {order}: {error}"),
        }

        println!("order {order} took {}ms", started.elapsed().as_millis());
    }

    println!(
        "inventory circuit is {}, payment circuit is {}",
        handler.inventory.state(),
        handler.payment.state()
    );

    Ok(())
}
