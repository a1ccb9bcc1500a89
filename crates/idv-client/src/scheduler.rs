//! Bounded fixed-delay polling with cancellation.
//!
//! Only a `Continue(Poll)` outcome schedules another attempt. Any other
//! outcome, terminal or a `Continue` to a different step, ends polling and
//! is handed back to the engine.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use idv_core::{Step, StepOutcome, VerificationError};

/// Result of one polling phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    /// Final outcome; `None` when cancelled.
    pub outcome: Option<StepOutcome>,
    /// Number of times the action ran.
    pub attempts: u32,
}

/// Fixed-delay polling loop.
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    delay: Duration,
    max_attempts: u32,
    cancel: CancellationToken,
}

impl RetryScheduler {
    /// A scheduler making at most `max_attempts` attempts (at least 1),
    /// `delay` apart.
    pub fn new(delay: Duration, max_attempts: u32, cancel: CancellationToken) -> Self {
        Self {
            delay,
            max_attempts: max_attempts.max(1),
            cancel,
        }
    }

    /// Run `action(attempt)` until it stops asking to poll, the attempts run
    /// out, or the token is cancelled. Attempts are numbered from 1.
    ///
    /// An attempt in flight when the token fires is dropped and its outcome
    /// is never reported.
    pub async fn poll<F, Fut>(&self, mut action: F) -> PollReport
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = StepOutcome>,
    {
        let mut attempts = 0;
        loop {
            if self.cancel.is_cancelled() {
                return self.cancelled(attempts);
            }
            attempts += 1;

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cancelled(attempts),
                outcome = action(attempts) => outcome,
            };
            if self.cancel.is_cancelled() {
                return self.cancelled(attempts);
            }

            match outcome {
                StepOutcome::Continue { next: Step::Poll } => {
                    if attempts >= self.max_attempts {
                        tracing::warn!(attempts, "poll attempts exhausted");
                        return PollReport {
                            outcome: Some(VerificationError::Timeout { attempts }.into_outcome()),
                            attempts,
                        };
                    }
                    tracing::debug!(
                        attempt = attempts,
                        max_attempts = self.max_attempts,
                        "still running, polling again in {:?}",
                        self.delay
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return self.cancelled(attempts),
                        _ = tokio::time::sleep(self.delay) => {}
                    }
                }
                other => {
                    return PollReport {
                        outcome: Some(other),
                        attempts,
                    }
                }
            }
        }
    }

    fn cancelled(&self, attempts: u32) -> PollReport {
        tracing::debug!(attempts, "polling cancelled");
        PollReport {
            outcome: None,
            attempts,
        }
    }
}
