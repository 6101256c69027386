use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::domain::UserId;

// ============== Authorization ==============

/// An empty allow list leaves the bot open to everyone.
pub fn is_authorized(user_id: Option<UserId>, allowed_users: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    allowed_users.is_empty() || allowed_users.contains(&user_id.0)
}

// ============== Rate Limiter (Token Bucket) ==============

#[derive(Clone, Debug)]
struct Bucket {
    tokens: f64,
    last_update: Instant,
}

#[derive(Clone, Debug)]
pub struct RateLimiter {
    enabled: bool,
    max_tokens: f64,
    refill_per_sec: f64,
    buckets: HashMap<UserId, Bucket>,
}

impl RateLimiter {
    pub fn new(enabled: bool, max_tokens: u32, window: Duration) -> Self {
        let max_tokens_f = max_tokens as f64;
        let window_secs = window.as_secs_f64().max(1e-9);

        Self {
            enabled,
            max_tokens: max_tokens_f,
            refill_per_sec: max_tokens_f / window_secs,
            buckets: HashMap::new(),
        }
    }

    /// Take one token. `Err(wait)` tells how long until the next token.
    pub fn check(&mut self, user_id: UserId) -> Result<(), Duration> {
        self.check_at(user_id, Instant::now())
    }

    pub fn check_at(&mut self, user_id: UserId, now: Instant) -> Result<(), Duration> {
        if !self.enabled {
            return Ok(());
        }

        let bucket = self.buckets.entry(user_id).or_insert_with(|| Bucket {
            tokens: self.max_tokens,
            last_update: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_update).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.max_tokens);
        bucket.last_update = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }

        if self.refill_per_sec <= 0.0 {
            return Err(Duration::MAX);
        }
        let secs = (1.0 - bucket.tokens) / self.refill_per_sec;
        Err(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allow_list_is_open() {
        assert!(is_authorized(Some(UserId(5)), &[]));
        assert!(!is_authorized(None, &[]));
        assert!(is_authorized(Some(UserId(5)), &[1, 5]));
        assert!(!is_authorized(Some(UserId(6)), &[1, 5]));
    }

    #[test]
    fn rate_limiter_basic_refill() {
        let start = Instant::now();
        let mut rl = RateLimiter::new(true, 2, Duration::from_secs(10));
        let u = UserId(1);

        assert!(rl.check_at(u, start).is_ok());
        assert!(rl.check_at(u, start).is_ok());
        let wait = rl.check_at(u, start).unwrap_err();
        assert!(wait < Duration::from_secs(6));

        // After 5 seconds, we should have refilled 1 token (2 tokens / 10s).
        assert!(rl.check_at(u, start + Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let start = Instant::now();
        let mut rl = RateLimiter::new(false, 0, Duration::from_secs(10));
        for _ in 0..100 {
            assert!(rl.check_at(UserId(1), start).is_ok());
        }
    }

    #[test]
    fn buckets_are_per_user() {
        let start = Instant::now();
        let mut rl = RateLimiter::new(true, 1, Duration::from_secs(60));
        assert!(rl.check_at(UserId(1), start).is_ok());
        assert!(rl.check_at(UserId(1), start).is_err());
        assert!(rl.check_at(UserId(2), start).is_ok());
    }
}
