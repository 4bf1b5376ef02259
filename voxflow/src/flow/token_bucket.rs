//! Token bucket rate-limiting primitive.

use std::time::{Duration, Instant};

/// A single refillable token bucket.
///
/// Methods take an explicit `now` so callers control the clock; the
/// invariant `0 <= tokens <= capacity` holds after every refill.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    capacity: f64,
    /// Tokens added per second.
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a bucket starting at full capacity.
    #[must_use]
    pub fn new(capacity: f64, refill_rate: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: now,
        }
    }

    /// Adds tokens for the time elapsed since the last refill, capped at
    /// capacity.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Refills, then consumes one token if available.
    ///
    /// Refill-then-consume runs under the caller's lock, so two concurrent
    /// callers can never both succeed on the last token.
    pub fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until one token will be available, without mutating state.
    #[must_use]
    pub fn time_until_ready(&self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        if tokens >= 1.0 || self.refill_rate <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((1.0 - tokens) / self.refill_rate)
    }

    /// Current token count.
    #[must_use]
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Bucket capacity.
    #[must_use]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_full() {
        let now = Instant::now();
        let bucket = TokenBucket::new(10.0, 1.0, now);
        assert!((bucket.tokens() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_consume_drains() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(3.0, 1.0, now);

        assert!(bucket.try_consume(now));
        assert!(bucket.try_consume(now));
        assert!(bucket.try_consume(now));
        assert!(!bucket.try_consume(now));
    }

    #[test]
    fn test_refill_is_capped_at_capacity() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(5.0, 100.0, now);

        bucket.refill(now + Duration::from_secs(60));
        assert!(bucket.tokens() <= 5.0);
    }

    #[test]
    fn test_refill_restores_consumed_tokens() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(2.0, 1.0, now);

        assert!(bucket.try_consume(now));
        assert!(bucket.try_consume(now));
        assert!(!bucket.try_consume(now));

        // One second at 1 token/s brings one back
        assert!(bucket.try_consume(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_fractional_refill() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(1.0, 1.0, now);
        assert!(bucket.try_consume(now));

        // Half a token is not enough
        assert!(!bucket.try_consume(now + Duration::from_millis(500)));
        assert!(bucket.try_consume(now + Duration::from_millis(1600)));
    }

    #[test]
    fn test_time_until_ready() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(1.0, 2.0, now);

        assert_eq!(bucket.time_until_ready(now), Duration::ZERO);

        assert!(bucket.try_consume(now));
        let wait = bucket.time_until_ready(now);
        assert!(wait > Duration::from_millis(400) && wait <= Duration::from_millis(500));
    }

    #[test]
    fn test_time_until_ready_does_not_mutate() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(1.0, 1.0, now);
        assert!(bucket.try_consume(now));

        let before = bucket.tokens();
        let _ = bucket.time_until_ready(now + Duration::from_secs(10));
        assert!((bucket.tokens() - before).abs() < f64::EPSILON);
    }

    #[test]
    fn test_never_negative() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(1.0, 0.5, now);

        for _ in 0..10 {
            let _ = bucket.try_consume(now);
        }
        assert!(bucket.tokens() >= 0.0);
    }
}
