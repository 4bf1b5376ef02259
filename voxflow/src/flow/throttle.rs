//! Keyed outbound message throttling.
//!
//! One token bucket per logical sender (channel id, user id). Buckets live
//! in a sharded concurrent map so unrelated keys do not contend on a
//! global lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::flow::token_bucket::TokenBucket;

/// Configuration for message throttling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Sustained rate limit per key.
    pub max_messages_per_minute: u32,
    /// Bucket capacity; bursts up to this size pass immediately.
    pub burst_size: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_messages_per_minute: 60,
            burst_size: 10,
        }
    }
}

impl ThrottleConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sustained per-minute rate.
    #[must_use]
    pub fn with_max_messages_per_minute(mut self, rate: u32) -> Self {
        self.max_messages_per_minute = rate;
        self
    }

    /// Sets the burst capacity.
    #[must_use]
    pub fn with_burst_size(mut self, burst: u32) -> Self {
        self.burst_size = burst;
        self
    }

    /// Refill rate in tokens per second.
    #[must_use]
    pub fn refill_rate(&self) -> f64 {
        f64::from(self.max_messages_per_minute) / 60.0
    }
}

/// Counters for throttling decisions.
#[derive(Debug, Default)]
pub struct ThrottleStats {
    allowed: AtomicU64,
    throttled: AtomicU64,
}

impl ThrottleStats {
    /// Number of messages that consumed a token.
    #[must_use]
    pub fn allowed(&self) -> u64 {
        self.allowed.load(Ordering::Relaxed)
    }

    /// Number of messages denied for lack of tokens.
    #[must_use]
    pub fn throttled(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }

    /// Converts the counters to a dictionary for telemetry sinks.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "allowed": self.allowed(),
            "throttled": self.throttled(),
        })
    }
}

/// Per-key token-bucket rate limiter for outbound messages.
pub struct MessageThrottler {
    config: ThrottleConfig,
    buckets: DashMap<String, TokenBucket>,
    stats: ThrottleStats,
}

impl Default for MessageThrottler {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

impl MessageThrottler {
    /// Creates a throttler with the given configuration.
    #[must_use]
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
            stats: ThrottleStats::default(),
        }
    }

    /// Attempts to consume one token for `key`.
    ///
    /// Unseen keys start with a full bucket. The refill-then-consume runs
    /// while the map entry is held exclusively, so concurrent callers on
    /// the same key are serialized.
    pub fn try_acquire(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| {
            TokenBucket::new(
                f64::from(self.config.burst_size),
                self.config.refill_rate(),
                now,
            )
        });

        let allowed = bucket.try_consume(now);
        if allowed {
            self.stats.allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.throttled.fetch_add(1, Ordering::Relaxed);
            trace!(key, "message throttled");
        }
        allowed
    }

    /// Time until `key` will have a token, without consuming anything.
    ///
    /// Zero for unseen keys and keys that already have a token.
    #[must_use]
    pub fn time_until_ready(&self, key: &str) -> Duration {
        self.buckets
            .get(key)
            .map_or(Duration::ZERO, |bucket| {
                bucket.time_until_ready(Instant::now())
            })
    }

    /// Drops the bucket for `key`; the next acquire starts full again.
    pub fn reset(&self, key: &str) {
        self.buckets.remove(key);
    }

    /// Drops all buckets.
    pub fn reset_all(&self) {
        self.buckets.clear();
    }

    /// Throttling counters.
    #[must_use]
    pub fn stats(&self) -> &ThrottleStats {
        &self.stats
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

impl std::fmt::Debug for MessageThrottler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageThrottler")
            .field("config", &self.config)
            .field("tracked_keys", &self.tracked_keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_burst_then_deny() {
        let throttler = MessageThrottler::new(ThrottleConfig::default());

        for i in 0..10 {
            assert!(throttler.try_acquire("channel-1"), "burst message {i}");
        }
        assert!(!throttler.try_acquire("channel-1"));
    }

    #[test]
    fn test_keys_are_independent() {
        let throttler =
            MessageThrottler::new(ThrottleConfig::new().with_burst_size(1));

        assert!(throttler.try_acquire("a"));
        assert!(!throttler.try_acquire("a"));
        assert!(throttler.try_acquire("b"));
    }

    #[test]
    fn test_unseen_key_has_zero_wait() {
        let throttler = MessageThrottler::default();
        assert_eq!(throttler.time_until_ready("never-seen"), Duration::ZERO);
    }

    #[test]
    fn test_wait_after_exhaustion() {
        let throttler = MessageThrottler::new(
            ThrottleConfig::new()
                .with_burst_size(1)
                .with_max_messages_per_minute(60),
        );

        assert!(throttler.try_acquire("k"));
        let wait = throttler.time_until_ready("k");
        // 1 token/s refill: roughly a second away
        assert!(wait > Duration::from_millis(500));
        assert!(wait <= Duration::from_secs(1));
    }

    #[test]
    fn test_reset_restores_full_bucket() {
        let throttler =
            MessageThrottler::new(ThrottleConfig::new().with_burst_size(1));

        assert!(throttler.try_acquire("k"));
        assert!(!throttler.try_acquire("k"));

        throttler.reset("k");
        assert!(throttler.try_acquire("k"));
    }

    #[test]
    fn test_reset_all() {
        let throttler =
            MessageThrottler::new(ThrottleConfig::new().with_burst_size(1));
        assert!(throttler.try_acquire("a"));
        assert!(throttler.try_acquire("b"));
        assert_eq!(throttler.tracked_keys(), 2);

        throttler.reset_all();
        assert_eq!(throttler.tracked_keys(), 0);
        assert!(throttler.try_acquire("a"));
    }

    #[test]
    fn test_stats_counters() {
        let throttler =
            MessageThrottler::new(ThrottleConfig::new().with_burst_size(2));

        assert!(throttler.try_acquire("k"));
        assert!(throttler.try_acquire("k"));
        assert!(!throttler.try_acquire("k"));

        assert_eq!(throttler.stats().allowed(), 2);
        assert_eq!(throttler.stats().throttled(), 1);
        assert_eq!(throttler.stats().to_dict()["throttled"], 1);
    }

    #[test]
    fn test_no_oversubscription_under_concurrency() {
        let throttler = Arc::new(MessageThrottler::new(
            ThrottleConfig::new()
                .with_burst_size(10)
                .with_max_messages_per_minute(0),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let throttler = throttler.clone();
                std::thread::spawn(move || {
                    let mut granted = 0u32;
                    for _ in 0..10 {
                        if throttler.try_acquire("shared") {
                            granted += 1;
                        }
                    }
                    granted
                })
            })
            .collect();

        let total: u32 = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .sum();

        // No refill configured, so exactly the burst can ever be granted
        assert_eq!(total, 10);
    }
}
