use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Zero means "no limit" for `max_attempts` and `deadline_seconds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub deadline_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
            deadline_seconds: 0,
        }
    }
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        Self {
            max_attempts: 0,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            multiplier: 1.0,
            deadline_seconds: 0,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts == 0 && self.deadline_seconds == 0
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.initial_delay_ms == 0 {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let factor = self.multiplier.max(1.0).powi(exp);
        let raw = self.initial_delay_ms as f64 * factor;
        let capped = if self.max_delay_ms > 0 {
            raw.min(self.max_delay_ms as f64)
        } else {
            raw
        };
        Duration::from_millis(capped.min(u64::MAX as f64) as u64)
    }

    pub fn allows_another(&self, attempt: u32, elapsed: Duration) -> bool {
        if self.max_attempts > 0 && attempt >= self.max_attempts {
            return false;
        }
        if self.deadline_seconds > 0 {
            let next = elapsed + self.delay_after(attempt);
            if next >= Duration::from_secs(self.deadline_seconds) {
                return false;
            }
        }
        true
    }
}

pub trait Clock {
    fn now(&self) -> Instant;

    /// Waits for `d`, returning early with false if `cancel` fires.
    fn sleep(&self, d: Duration, cancel: &CancelToken) -> bool;
}

const SLEEP_SLICE: Duration = Duration::from_millis(250);

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration, cancel: &CancelToken) -> bool {
        // Short slices so a cancellation is noticed promptly.
        let mut left = d;
        while !left.is_zero() {
            if cancel.is_cancelled() {
                return false;
            }
            let step = left.min(SLEEP_SLICE);
            std::thread::sleep(step);
            left -= step;
        }
        !cancel.is_cancelled()
    }
}

#[derive(Debug, Default, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
