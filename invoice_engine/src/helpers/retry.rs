use std::{future::Future, time::Duration};

use log::*;
use rand::Rng;

/// Exponential backoff with jitter for calls to flaky upstream services.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Always at least one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction of each delay that is randomised, e.g. 0.1 gives ±10%.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// A policy that retries immediately. Handy in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts, initial_delay: Duration::ZERO, max_delay: Duration::ZERO, multiplier: 1.0, jitter_factor: 0.0 }
    }

    /// The delay to wait after the given (1-based) failed attempt, before jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        if capped.is_finite() && capped > 0.0 {
            Duration::from_millis(capped.round() as u64)
        } else {
            Duration::ZERO
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 || delay.is_zero() {
            return delay;
        }
        let base = delay.as_millis() as f64;
        let range = base * self.jitter_factor;
        let jitter: f64 = rand::thread_rng().gen_range(-range..=range);
        Duration::from_millis((base + jitter).max(1.0) as u64)
    }

    /// Runs `operation` until it succeeds, the error is not retryable, or the attempt budget is spent. The last error
    /// is returned.
    pub async fn run<T, E, F, Fut>(&self, label: &str, retryable: fn(&E) -> bool, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < max_attempts && retryable(&e) => {
                    let delay = self.jittered(self.base_delay(attempt));
                    warn!("🛰️ {label} failed on attempt {attempt}/{max_attempts}. Retrying in {delay:?}. {e}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(e) => {
                    debug!("🛰️ {label} failed on attempt {attempt}/{max_attempts}. Giving up. {e}");
                    return Err(e);
                },
            }
        }
    }
}
