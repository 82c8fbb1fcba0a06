//! Single retry-policy object shared by the LLM client, the store writer,
//! and the store retrieval path used by the verifier (spec §9: "Retry
//! policy duplication -> one policy object").

use crate::core::error::{Classify, RetryClass};
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of classifying a failure against a `RetryPolicy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Skip,
    Fatal,
}

/// Parameterized backoff policy. `classify` is supplied by the caller's
/// error type via the `Classify` trait rather than re-derived per call site.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub rate_limit_multiplier: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay, rate_limit_multiplier: 2 }
    }

    /// Map an abstract `RetryClass` onto a decision (spec §7 taxonomy).
    pub fn decide(&self, class: RetryClass) -> RetryDecision {
        match class {
            RetryClass::TransientExternal | RetryClass::RateLimitExternal => RetryDecision::Retry,
            RetryClass::ClientMisuse
            | RetryClass::ValidationFailure
            | RetryClass::StoreVerificationMiss => RetryDecision::Fatal,
            RetryClass::ResourceExhaustion | RetryClass::BackendAbsence => RetryDecision::Fatal,
            RetryClass::MediaPermission => RetryDecision::Skip,
        }
    }

    /// Backoff delay before attempt number `attempt` (1-indexed), doubled
    /// again for rate-limit classes per spec §4.8.
    pub fn backoff(&self, attempt: u32, class: RetryClass) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let base = self.base_delay * 2u32.saturating_pow(exponent);
        if class == RetryClass::RateLimitExternal {
            base * self.rate_limit_multiplier
        } else {
            base
        }
    }

    /// Drive an async operation through the policy. `op` is invoked up to
    /// `max_attempts` times; sleeps between attempts use `backoff`.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: Classify + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let class = err.retry_class();
                    let decision = self.decide(class);
                    if decision != RetryDecision::Retry || attempt >= self.max_attempts {
                        warn!(%label, attempt, %err, ?decision, "retry policy giving up");
                        return Err(err);
                    }
                    let delay = self.backoff(attempt, class);
                    debug!(%label, attempt, ?delay, %err, "retrying after backoff");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}
