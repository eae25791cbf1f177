use std::time::Duration;

use crate::Classification;

/// What the execution loop does after an attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// The attempt is terminal: success, final failure or exhausted budget.
    Stop,
    /// Send again after `wait`.
    Retry { wait: Duration },
}

impl RetryDecision {
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Retry budget of a single call.
///
/// `max_retries` counts repeats, not attempts: a budget of 2 allows the
/// nominal attempt plus two retries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Fixed delay before every retry. `None` retries immediately.
    pub sleep_before_repeat: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, sleep_before_repeat: Option<Duration>) -> Self {
        Self {
            max_retries,
            sleep_before_repeat,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Decides what follows attempt number `attempt` (1-based).
    pub fn decide(&self, attempt: u32, outcome: Classification) -> RetryDecision {
        if outcome.is_success() || !outcome.retriable || attempt > self.max_retries {
            return RetryDecision::Stop;
        }
        RetryDecision::Retry {
            wait: self.sleep_before_repeat.unwrap_or(Duration::ZERO),
        }
    }
}
