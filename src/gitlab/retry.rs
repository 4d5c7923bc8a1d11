use std::future::Future;
use std::time::Duration;

use crate::constants::{CHANGES_MAX_ATTEMPTS, CHANGES_RETRY_DELAY};

/// Fixed-delay retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: CHANGES_MAX_ATTEMPTS,
            delay: CHANGES_RETRY_DELAY,
        }
    }
}

/// What a single attempt decided.
#[derive(Debug)]
pub(crate) enum Attempt<T> {
    Done(T),
    Retry,
    Abort,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outcome<T> {
    Done(T),
    Aborted,
    Exhausted,
}

impl<T> Outcome<T> {
    pub(crate) fn into_option(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::Aborted | Outcome::Exhausted => None,
        }
    }
}

/// Run `op` until it is done, aborts, or the policy runs out of attempts.
///
/// `op` receives the 1-based attempt number. The delay follows every
/// `Attempt::Retry`, the last one included.
pub(crate) async fn retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Outcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    for attempt in 1..=policy.max_attempts {
        match op(attempt).await {
            Attempt::Done(value) => return Outcome::Done(value),
            Attempt::Abort => return Outcome::Aborted,
            Attempt::Retry => {
                tracing::info!(
                    "Empty answer, waiting {:?} (attempt {attempt}/{})",
                    policy.delay,
                    policy.max_attempts
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
    tracing::warn!("Max retries ({}) reached", policy.max_attempts);
    Outcome::Exhausted
}
