//! Bounded retry with a fixed back-off delay for the start operation.
//!
//! The combinator is decoupled from the subprocess call: it drives any
//! attempt function through the budget and sleeps through a [`Sleeper`] seam,
//! so tests exercise the schedule with a fake attempt and a recording clock.
//! No delay follows the final attempt; a budget of three produces at most two
//! sleeps.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use super::TunnelError;

/// Attempt budget and inter-attempt delay for the start operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Reference policy: three attempts, five seconds apart.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Outcome of a single start attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AttemptOutcome {
    /// The binary reported the connected state with this message.
    Connected(String),
    /// The attempt failed for this reason; the budget decides what happens
    /// next.
    Failed(String),
}

/// Boxed future returned by [`Sleeper`] implementations.
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a>>;

/// Clock seam so tests can observe and skip the back-off delays.
pub trait Sleeper {
    /// Resolves after `duration` has elapsed.
    fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}

/// Production sleeper backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Drives `attempt` through the policy's budget.
///
/// A connected outcome returns immediately with the binary's message. A
/// failed outcome sleeps the fixed delay and retries while attempts remain;
/// once the budget is exhausted the last failure reason becomes the fatal
/// error. An `Err` from the attempt function aborts the schedule at once:
/// those are failures retrying cannot fix, such as a missing executable.
///
/// # Errors
///
/// Returns [`TunnelError::StartFailed`] when every attempt fails, or the
/// attempt function's own error when it aborts.
pub async fn start_with_retry<F, Fut>(
    policy: RetryPolicy,
    sleeper: &dyn Sleeper,
    mut attempt: F,
) -> Result<String, TunnelError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<AttemptOutcome, TunnelError>>,
{
    let budget = policy.max_attempts.max(1);
    let mut last_reason = String::new();

    for number in 1..=budget {
        match attempt(number).await? {
            AttemptOutcome::Connected(message) => return Ok(message),
            AttemptOutcome::Failed(reason) => {
                if number < budget {
                    debug!(
                        attempt = number,
                        delay_ms = u64::try_from(policy.delay.as_millis()).unwrap_or(u64::MAX),
                        reason = %reason,
                        "tunnel start attempt failed; retrying after delay"
                    );
                    sleeper.sleep(policy.delay).await;
                }
                last_reason = reason;
            }
        }
    }

    Err(TunnelError::StartFailed {
        reason: last_reason,
    })
}
