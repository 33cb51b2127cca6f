//! # Retry / Poll
//! Repeatedly invokes an async target until it yields an accepted value, an
//! error that is not swallowed, or the time budget runs out.
//!
//! - `inspector`: a returned value is accepted only if the inspector says so.
//! - `swallow`: errors matching the predicate are retried, others propagate.
//! - Between attempts sleeps `min(base * (1.5^n - 1) * U(0.1, 5.6 * cap), cap)`
//!   with `base = 50ms`, `cap = 7s`. The random multiplier spreads out callers
//!   that contend for the same upstream.
//! - After the budget elapses, one final attempt is made and its outcome is
//!   returned as-is (value unchecked, error propagated).

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::error::{DataError, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const BASE_DELAY_SECS: f64 = 0.05;
const CAP_DELAY_SECS: f64 = 7.0;

type Inspector<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type Swallow<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

pub struct Poll<T, E> {
    timeout: Duration,
    backoff: bool,
    inspector: Option<Inspector<T>>,
    swallow: Swallow<E>,
}

impl<T, E> Poll<T, E> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            backoff: true,
            inspector: None,
            swallow: Box::new(|_| false),
        }
    }

    pub fn inspect(mut self, f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.inspector = Some(Box::new(f));
        self
    }

    pub fn swallow(mut self, f: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.swallow = Box::new(f);
        self
    }

    pub fn backoff(mut self, on: bool) -> Self {
        self.backoff = on;
        self
    }

    pub async fn run<F, Fut>(&self, mut target: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut attempt: i32 = 0;

        while Instant::now() < deadline {
            attempt += 1;
            match target().await {
                Ok(v) => {
                    let accepted = self.inspector.as_ref().map(|f| f(&v)).unwrap_or(true);
                    if accepted {
                        return Ok(v);
                    }
                }
                Err(e) => {
                    if !(self.swallow)(&e) {
                        return Err(e);
                    }
                }
            }

            if self.backoff {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let delay = backoff_delay(attempt).min(remaining);
                tokio::time::sleep(delay).await;
            }
        }

        tracing::debug!(target: "retry", attempts = attempt, "budget exhausted, final attempt");
        target().await
    }
}

impl<T, E> Default for Poll<T, E> {
    /// [`DEFAULT_TIMEOUT`] budget, backoff on, nothing swallowed.
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

/// Jittered exponential delay for the `n`-th retry (n >= 1).
pub fn backoff_delay(n: i32) -> Duration {
    let jitter = rand::rng().random_range(0.1..5.6 * CAP_DELAY_SECS);
    let secs = (BASE_DELAY_SECS * (1.5f64.powi(n) - 1.0) * jitter).min(CAP_DELAY_SECS);
    Duration::from_secs_f64(secs.max(0.0))
}

/// Retry any transient `DataError` within `timeout`.
pub async fn pool<T, F, Fut>(timeout: Duration, target: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    Poll::<T, DataError>::new(timeout)
        .swallow(DataError::is_transient)
        .run(target)
        .await
}

/// Retry on every error within `timeout`.
pub async fn pool_any<T, F, Fut>(timeout: Duration, target: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    Poll::<T, DataError>::new(timeout)
        .swallow(|_| true)
        .run(target)
        .await
}
