// src/ingest/retry.rs
//! Bounded retry state for one fetch call.
//!
//! The state machine is just an error counter and a current delay. Transient
//! faults double the delay up to `max`, clean pages halve it down to `min`,
//! and the first fault past `max_errors` turns into `ScanError::Ingestion`.
//! Nothing here sleeps; callers decide when to wait for `delay()`.

use std::time::Duration;

use crate::error::{Result, ScanError};
use crate::ingest::config::Backoff;

#[derive(Debug, Clone)]
pub struct RetryState {
    backoff: Backoff,
    delay: Duration,
    errors: u32,
}

impl RetryState {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            delay: backoff.initial.clamp(backoff.min, backoff.max.max(backoff.min)),
            backoff,
            errors: 0,
        }
    }

    /// Budget-only state for strategies whose waits are dictated by the server.
    pub fn with_budget(max_errors: u32) -> Self {
        Self::new(Backoff {
            initial: Duration::ZERO,
            min: Duration::ZERO,
            max: Duration::ZERO,
            max_errors,
        })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    /// Count a transient fault and double the delay (capped).
    ///
    /// Returns the delay to wait before retrying, or the fatal error once
    /// the error count exceeds the budget.
    pub fn record_failure(&mut self) -> Result<Duration> {
        self.delay = self.delay.saturating_mul(2).min(self.backoff.max);
        self.count_error()?;
        Ok(self.delay)
    }

    /// Count a fault whose wait time the server chose (e.g. `Retry-After`).
    pub fn record_dictated(&mut self, wait: Duration) -> Result<Duration> {
        self.delay = wait;
        self.count_error()?;
        Ok(wait)
    }

    /// A clean full page: halve the delay (floored).
    pub fn record_success(&mut self) -> Duration {
        self.delay = (self.delay / 2).max(self.backoff.min);
        self.delay
    }

    fn count_error(&mut self) -> Result<()> {
        self.errors += 1;
        if self.errors > self.backoff.max_errors {
            return Err(ScanError::Ingestion {
                errors: self.errors,
                last_delay: self.delay,
            });
        }
        Ok(())
    }
}
