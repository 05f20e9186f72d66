// In-memory rate limiter for the settlement endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Different rate limit types with their constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitType {
    /// Max settlement requests per hour. Replays of already-settled
    /// matches count too; clients reconnecting in a loop should back off.
    SettlementRequests,
}

impl RateLimitType {
    /// Maximum number of events allowed in the window.
    pub fn max_count(&self) -> usize {
        match self {
            RateLimitType::SettlementRequests => 120,
        }
    }

    /// Time window for the rate limit.
    pub fn window(&self) -> Duration {
        match self {
            RateLimitType::SettlementRequests => Duration::from_secs(3600),
        }
    }
}

impl std::fmt::Display for RateLimitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateLimitType::SettlementRequests => write!(f, "settlement requests per hour"),
        }
    }
}

/// Error returned when a rate limit is exceeded.
#[derive(Debug, Clone)]
pub struct RateLimitError {
    pub limit_type: RateLimitType,
    pub max: usize,
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rate limit exceeded: max {} {}",
            self.max, self.limit_type
        )
    }
}

/// Key for the rate limit map: (user_id, limit_type).
type LimitKey = (i64, RateLimitType);

/// Thread-safe in-memory rate limiter.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<LimitKey, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the user is within the rate limit for the given type.
    /// If within limits, records the event and returns Ok(()).
    /// If exceeded, returns Err(RateLimitError).
    /// In local mode, rate limiting is always bypassed.
    pub fn check_limit(
        &self,
        user_id: i64,
        limit_type: RateLimitType,
    ) -> Result<(), RateLimitError> {
        if crate::config::is_local_mode() {
            return Ok(());
        }
        let mut map = self.inner.lock().unwrap();
        let key = (user_id, limit_type);
        let window = limit_type.window();
        let max = limit_type.max_count();
        let now = Instant::now();

        let entries = map.entry(key).or_insert_with(Vec::new);

        // Remove expired entries
        entries.retain(|t| now.duration_since(*t) < window);

        if entries.len() >= max {
            return Err(RateLimitError { limit_type, max });
        }

        entries.push(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit_then_rejects() {
        crate::config::set_local_mode(false);
        let limiter = RateLimiter::new();
        let max = RateLimitType::SettlementRequests.max_count();

        for _ in 0..max {
            assert!(limiter
                .check_limit(1, RateLimitType::SettlementRequests)
                .is_ok());
        }
        let err = limiter
            .check_limit(1, RateLimitType::SettlementRequests)
            .unwrap_err();
        assert_eq!(err.max, max);
    }

    #[test]
    fn test_limits_are_per_user() {
        crate::config::set_local_mode(false);
        let limiter = RateLimiter::new();
        let max = RateLimitType::SettlementRequests.max_count();

        for _ in 0..max {
            limiter
                .check_limit(1, RateLimitType::SettlementRequests)
                .unwrap();
        }
        // A different user still has a fresh budget.
        assert!(limiter
            .check_limit(2, RateLimitType::SettlementRequests)
            .is_ok());
    }
}
