//! Retry policies and the retry executor.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::category::Category;
use crate::failure::{Failure, Outcome};

/// Decides whether a failure should be retried.
pub type RetryPredicate = Arc<dyn Fn(&Failure) -> bool + Send + Sync>;

/// Backoff strategy for retries.
#[derive(Debug, Clone)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Constant delay between retries.
    Constant(Duration),
    /// Linear backoff: delay increases by a fixed amount.
    Linear {
        /// Delay increment per attempt.
        delay: Duration,
        /// Maximum delay.
        max: Duration,
    },
    /// Exponential backoff: delay doubles each attempt.
    Exponential {
        /// Initial delay.
        initial: Duration,
        /// Maximum delay.
        max: Duration,
        /// Multiplier (typically 2.0).
        multiplier: f64,
    },
}

impl BackoffStrategy {
    /// Calculate delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Constant(d) => *d,
            Self::Linear { delay, max } => {
                let total = delay.saturating_mul(attempt + 1);
                total.min(*max)
            }
            Self::Exponential { initial, max, multiplier } => {
                let factor = multiplier.powi(attempt as i32);
                let millis = (initial.as_millis() as f64 * factor) as u64;
                Duration::from_millis(millis).min(*max)
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(5000),
            multiplier: 2.0,
        }
    }
}

/// When and how long to wait before re-invoking a failed call.
#[derive(Clone)]
pub struct RetryPolicy {
    predicate: RetryPredicate,
    backoff: BackoffStrategy,
    max_retries: u32,
    jitter: bool,
    max_delay: Duration,
    throttle_floor: Duration,
}

impl Default for RetryPolicy {
    /// Retry transient failures up to 5 times with jittered exponential
    /// backoff from 100ms, each delay capped at 5s.
    fn default() -> Self {
        Self {
            predicate: Arc::new(Failure::is_transient),
            backoff: BackoffStrategy::default(),
            max_retries: 5,
            jitter: true,
            max_delay: Duration::from_millis(5000),
            throttle_floor: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Create a policy retrying transient failures with the given backoff.
    pub fn new(max_retries: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_retries,
            backoff,
            ..Default::default()
        }
    }

    /// A policy that never retries.
    pub fn never() -> Self {
        Self {
            predicate: Arc::new(|_| false),
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Only retry failures matching the predicate.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Failure) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Set the maximum number of retries (calls beyond the first).
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the backoff strategy.
    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Enable or disable jitter (a uniform factor in `[0.8, 1.2]`).
    pub fn jitter(mut self, enable: bool) -> Self {
        self.jitter = enable;
        self
    }

    /// Cap every computed backoff delay.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Minimum delay after a throttling failure.
    pub fn throttle_floor(mut self, floor: Duration) -> Self {
        self.throttle_floor = floor;
        self
    }

    /// Maximum number of retries.
    pub fn retries(&self) -> u32 {
        self.max_retries
    }

    /// Check if a failure should be retried.
    pub fn should_retry(&self, failure: &Failure) -> bool {
        (self.predicate)(failure)
    }

    /// Delay before retry number `attempt` (0-indexed) after `failure`.
    ///
    /// Throttling failures wait at least the throttle floor, and at least the
    /// server's `Retry-After` when one was sent. The explicit server delay is
    /// not subject to the cap.
    pub fn delay_for(&self, attempt: u32, failure: &Failure) -> Duration {
        let mut delay = self.backoff.delay_for_attempt(attempt);
        if self.jitter && !delay.is_zero() {
            let factor = rand::rng().random_range(0.8..=1.2);
            delay = delay.mul_f64(factor);
        }
        delay = delay.min(self.max_delay);

        if failure.has_category(Category::Throttling) {
            delay = delay.max(self.throttle_floor);
        }
        if let Some(retry_after) = failure.retry_after() {
            delay = delay.max(retry_after);
        }
        delay
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("backoff", &self.backoff)
            .field("max_retries", &self.max_retries)
            .field("jitter", &self.jitter)
            .field("max_delay", &self.max_delay)
            .field("throttle_floor", &self.throttle_floor)
            .finish_non_exhaustive()
    }
}

/// Invoke `call`, re-invoking it after a delay while the policy says so.
///
/// Returns the first success, the first failure the policy declines to
/// retry, or the last failure once retries are exhausted. Calls and delays
/// are strictly sequential; dropping the returned future cancels both.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut call: F) -> Outcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Outcome<T>>,
{
    let mut attempt = 0;
    loop {
        let failure = match call().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempt = attempt + 1, "Retry succeeded");
                }
                return Ok(value);
            }
            Err(failure) => failure,
        };

        if !policy.should_retry(&failure) {
            return Err(failure);
        }
        if attempt >= policy.max_retries {
            warn!(
                attempts = attempt + 1,
                tag = failure.tag(),
                error = %failure,
                "Retries exhausted"
            );
            return Err(failure);
        }

        let delay = policy.delay_for(attempt, &failure);
        debug!(
            attempt = attempt + 1,
            delay = ?delay,
            tag = failure.tag(),
            error = %failure,
            "Call failed, retrying"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}
