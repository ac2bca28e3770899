//! Rate limit for transactions paying less than the relay fee.
//!
//! A byte counter decays exponentially with a ten-minute time constant;
//! a free transaction is let through while the counter stays under the
//! allowance.

/// Decay time constant, seconds.
const DECAY_SECONDS: f64 = 600.0;

#[derive(Debug, Default)]
pub struct FreeRelayLimiter {
    count: f64,
    last_time: u32,
}

impl FreeRelayLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes counted against the allowance at the last update.
    pub fn count(&self) -> f64 {
        self.count
    }

    /// Counts `size` bytes at `now` if they fit under `limit` thousand
    /// bytes per ten minutes.
    pub fn allow(&mut self, size: usize, now: u32, limit: u32) -> bool {
        let elapsed = now.saturating_sub(self.last_time);
        self.count *= (1.0 - 1.0 / DECAY_SECONDS).powi(elapsed as i32);
        self.last_time = now.max(self.last_time);

        let cap = f64::from(limit) * 10.0 * 1000.0;
        if self.count + size as f64 > cap {
            return false;
        }
        self.count += size as f64;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_and_decay() {
        let mut limiter = FreeRelayLimiter::new();
        let now = 1_000_000;
        assert!(limiter.allow(6_000, now, 1));
        assert!(limiter.allow(4_000, now, 1));
        assert!(!limiter.allow(1, now, 1));

        // After one time constant the counter is down to about 37%.
        assert!(limiter.allow(5_000, now + 600, 1));
        assert!(limiter.count() < 10_000.0);
    }

    #[test]
    fn test_clock_going_backwards_does_not_decay() {
        let mut limiter = FreeRelayLimiter::new();
        assert!(limiter.allow(9_000, 2_000, 1));
        assert!(!limiter.allow(2_000, 1_000, 1));
    }
}
