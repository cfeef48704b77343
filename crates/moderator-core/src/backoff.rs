//! Capped exponential backoff with deterministic jitter, for retrying
//! control-plane requests.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    factor: f64,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self { initial, max, factor }
    }

    /// 1s initial, capped at 10s, per the control-plane client's contract.
    pub fn control_plane_default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(10), 2.0)
    }

    /// Delay before the `attempt`-th retry (0-indexed), capped at `max` and
    /// jittered deterministically so repeated calls with the same attempt
    /// number don't produce identical thundering-herd delays across clients.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.factor.powi(attempt as i32);
        let raw_secs = self.initial.as_secs_f64() * exp;
        let capped_secs = raw_secs.min(self.max.as_secs_f64());
        let jitter = jitter_fraction(attempt);
        Duration::from_secs_f64(capped_secs * (0.85 + 0.3 * jitter))
    }
}

/// Knuth multiplicative-hash jitter in [0, 1), deterministic per attempt
/// number so tests are reproducible without a random source.
fn jitter_fraction(attempt: u32) -> f64 {
    let hashed = (attempt as u64).wrapping_mul(2654435761);
    (hashed % 1000) as f64 / 1000.0
}

/// Rate-limits repeated identical-error logging to at most once per
/// `period`.
pub struct LogRateLimiter {
    period: Duration,
    last_logged: Option<std::time::Instant>,
}

impl LogRateLimiter {
    pub fn new(period: Duration) -> Self {
        Self { period, last_logged: None }
    }

    /// Returns true if the caller should emit a log line now, recording that
    /// it did.
    pub fn should_log(&mut self) -> bool {
        let now = std::time::Instant::now();
        match self.last_logged {
            Some(last) if now.duration_since(last) < self.period => false,
            _ => {
                self.last_logged = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_caps() {
        let backoff = Backoff::control_plane_default();
        let d0 = backoff.delay_for_attempt(0);
        let d3 = backoff.delay_for_attempt(3);
        let d10 = backoff.delay_for_attempt(10);
        assert!(d0.as_secs_f64() < d3.as_secs_f64());
        assert!(d10.as_secs_f64() <= 11.0, "delay must stay near the 10s cap");
    }

    #[test]
    fn rate_limiter_suppresses_rapid_repeats() {
        let mut limiter = LogRateLimiter::new(Duration::from_millis(50));
        assert!(limiter.should_log());
        assert!(!limiter.should_log());
    }
}
