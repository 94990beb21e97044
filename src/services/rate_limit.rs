//! Per-user rate limiting for the interaction-tracking endpoint
//!
//! Uses a simple token bucket algorithm with in-memory storage. Tokens
//! are stored per user id and refill over time. The interaction counter
//! is at-least-once with no idempotency key, so this is the only brake
//! on a misbehaving client hammering increments.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Rate limiter configuration
pub struct RateLimitConfig {
    /// Maximum tokens (burst capacity)
    pub max_tokens: u32,
    /// Tokens added per second
    pub refill_rate: f64,
}

struct UserBucket {
    tokens: f64,
    last_update: Instant,
}

/// Per-user rate limiter using token bucket algorithm
pub struct UserRateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<Uuid, UserBucket>>,
}

impl UserRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Check if a request is allowed for the given user id.
    /// Returns true if allowed, false if rate limited.
    pub fn check(&self, user_id: Uuid) -> bool {
        let mut buckets = self.buckets.lock().unwrap();
        let now = Instant::now();

        let bucket = buckets.entry(user_id).or_insert_with(|| UserBucket {
            tokens: self.config.max_tokens as f64,
            last_update: now,
        });

        // Refill tokens based on time elapsed
        let elapsed = now.duration_since(bucket.last_update);
        let refill = elapsed.as_secs_f64() * self.config.refill_rate;
        bucket.tokens = (bucket.tokens + refill).min(self.config.max_tokens as f64);
        bucket.last_update = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets for users who haven't made requests in a while.
    /// Driven periodically by the upkeep task.
    pub fn cleanup(&self, max_age: Duration) {
        let mut buckets = self.buckets.lock().unwrap();
        let now = Instant::now();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_age);
    }
}

/// Global rate limiter for interaction tracking
/// - Burst of 10 interactions allowed
/// - Sustained rate of 1 per second
pub static INTERACTION_RATE_LIMITER: LazyLock<UserRateLimiter> = LazyLock::new(|| {
    UserRateLimiter::new(RateLimitConfig {
        max_tokens: 10,
        refill_rate: 1.0,
    })
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_limited() {
        let limiter = UserRateLimiter::new(RateLimitConfig {
            max_tokens: 3,
            refill_rate: 0.0,
        });
        let user = Uuid::new_v4();

        assert!(limiter.check(user));
        assert!(limiter.check(user));
        assert!(limiter.check(user));
        assert!(!limiter.check(user));

        // A different user has their own bucket
        assert!(limiter.check(Uuid::new_v4()));
    }
}
