//! Poll-until-true with a deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Polling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between attempts.
    pub interval: Duration,
    /// Stop once this much time has passed since the first attempt.
    pub deadline: Duration,
}

impl RetryPolicy {
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline }
    }
}

/// How a [`retry_until`] loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    /// The condition held on the last attempt.
    pub satisfied: bool,
    /// Last successful observation, if any attempt succeeded.
    pub last: Option<T>,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Run `attempt` until `done` accepts its result or the deadline passes.
///
/// The first attempt happens immediately, so there is always at least one.
/// Attempt errors count as "not yet" and are retried. Sleeps are clamped to the
/// remaining time so the loop never overshoots the deadline.
pub async fn retry_until<T, E, F, Fut, C>(
    policy: RetryPolicy,
    mut attempt: F,
    mut done: C,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    C: FnMut(&T) -> bool,
{
    let start = Instant::now();
    let interval = policy.interval.max(Duration::from_millis(1));
    let mut attempts = 0;
    let mut last = None;

    loop {
        attempts += 1;
        match attempt().await {
            Ok(value) => {
                let satisfied = done(&value);
                last = Some(value);
                if satisfied {
                    return RetryOutcome {
                        satisfied: true,
                        last,
                        attempts,
                        elapsed: start.elapsed(),
                    };
                }
            }
            Err(e) => {
                debug!(attempt = attempts, error = %e, "Attempt failed, retrying");
            }
        }

        let remaining = policy.deadline.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break;
        }
        tokio::time::sleep(interval.min(remaining)).await;
        if start.elapsed() >= policy.deadline {
            break;
        }
    }

    RetryOutcome {
        satisfied: false,
        last,
        attempts,
        elapsed: start.elapsed(),
    }
}
