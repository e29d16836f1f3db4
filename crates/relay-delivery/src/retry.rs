//! Exponential backoff schedule for forward attempts.
//!
//! Attempts are numbered from zero. Attempt 0 runs immediately and attempt
//! `k >= 1` waits `base_delay * 2^(k-1)` first. There is no jitter and no
//! delay cap; the schedule is fully determined by the policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES};

/// Largest exponent applied to the base delay before saturating.
const MAX_EXPONENT: u32 = 31;

/// How many times and how far apart the forwarder retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; total attempts is this plus one,
    /// saturating at `u32::MAX`.
    pub max_retries: u32,

    /// Delay before the first retry, doubled for each one after.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES, base_delay: DEFAULT_BASE_DELAY }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given retry count and base delay.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay }
    }

    /// Total attempts including the initial one.
    ///
    /// Saturates at `u32::MAX`, so a policy with `max_retries == u32::MAX`
    /// makes `u32::MAX` attempts rather than one more.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before attempt number `attempt`.
    ///
    /// Zero for the initial attempt. Saturates at [`Duration::MAX`] instead of
    /// overflowing for very large attempt numbers or base delays.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = (attempt - 1).min(MAX_EXPONENT);
        self.base_delay.saturating_mul(2_u32.saturating_pow(exponent))
    }

    /// Every backoff wait the policy schedules, in order.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.total_attempts()).map(|attempt| self.delay_before(attempt))
    }
}
