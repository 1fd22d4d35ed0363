use crate::error::Error;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use log::warn;
use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff without jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// The attempt ceiling is enforced by `retry_with_backoff`, so the schedule
    /// itself never gives up on elapsed time.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_randomization_factor(0.0)
            .with_multiplier(f64::from(self.multiplier))
            .with_max_interval(self.max_delay)
            .with_max_elapsed_time(None)
            .build()
    }
}

#[derive(Debug)]
pub enum FetchError {
    /// Worth another attempt: transport failures, rate limiting, server errors.
    Transient(String),
    /// Schema mismatches and the like; retrying will not help.
    Fatal(Error),
}

#[derive(Debug)]
pub enum RetryError {
    Exhausted { attempts: u32, last_error: String },
    Fatal(Error),
}

pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    use backoff::Error as BE;

    let max_attempts = policy.max_attempts;
    let mut attempts = 0u32;
    let request = || {
        attempts += 1;
        let last = attempts >= max_attempts;
        let fetch = operation();
        async move {
            match fetch.await {
                Ok(value) => Ok(value),
                Err(e @ FetchError::Fatal(_)) => Err(BE::permanent(e)),
                // Out of attempts: stop the schedule with the last transient failure.
                Err(e @ FetchError::Transient(_)) if last => Err(BE::permanent(e)),
                Err(e @ FetchError::Transient(_)) => Err(BE::transient(e)),
            }
        }
    };

    let notify = |e: FetchError, delay: Duration| {
        if let FetchError::Transient(reason) = e {
            warn!(
                "Fetching {} failed: {}. Retrying in {:?}",
                what, reason, delay
            );
        }
    };

    let result = backoff::future::retry_notify(policy.backoff(), request, notify).await;
    match result {
        Ok(value) => Ok(value),
        Err(FetchError::Fatal(e)) => Err(RetryError::Fatal(e)),
        Err(FetchError::Transient(last_error)) => Err(RetryError::Exhausted {
            attempts,
            last_error,
        }),
    }
}
