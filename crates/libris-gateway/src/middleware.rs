//! Gateway middleware.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};

/// Checks between sweeps of idle usernames.
const PRUNE_EVERY: usize = 1024;

/// Per-username limiter for login attempts.
///
/// Keys are whatever usernames clients send, so idle entries are swept
/// every [`PRUNE_EVERY`] checks.
pub struct LoginRateLimiter {
    limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
    checks: AtomicUsize,
    prune_every: usize,
}

impl LoginRateLimiter {
    /// Allow `attempts_per_minute` attempts per username (at least one).
    #[must_use]
    pub fn new(attempts_per_minute: u32) -> Self {
        Self::with_prune_interval(attempts_per_minute, PRUNE_EVERY)
    }

    fn with_prune_interval(attempts_per_minute: u32, prune_every: usize) -> Self {
        let quota =
            Quota::per_minute(NonZeroU32::new(attempts_per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::keyed(quota),
            checks: AtomicUsize::new(0),
            prune_every: prune_every.max(1),
        }
    }

    /// Record an attempt for `username` and report whether it is allowed.
    #[must_use]
    pub fn check(&self, username: &str) -> bool {
        let seen = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % self.prune_every == 0 {
            self.prune();
        }
        self.limiter.check_key(&username.to_lowercase()).is_ok()
    }

    /// Drop usernames whose quota has fully replenished.
    pub fn prune(&self) {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        tracing::trace!(before, after = self.limiter.len(), "Pruned login limiter");
    }

    /// Number of usernames currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.limiter.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(10)
    }
}

impl std::fmt::Debug for LoginRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRateLimiter")
            .field("tracked", &self.tracked())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_limits_per_username() {
        let limiter = LoginRateLimiter::new(2);
        assert!(limiter.check("alice"));
        assert!(limiter.check("Alice"));
        assert!(!limiter.check("alice"));

        assert!(limiter.check("bob"));
    }

    #[test]
    fn test_zero_quota_still_allows_one() {
        let limiter = LoginRateLimiter::new(0);
        assert!(limiter.check("carol"));
        assert!(!limiter.check("carol"));
    }

    #[test]
    fn test_idle_usernames_are_pruned() {
        // 6000/min replenishes one attempt every 10ms.
        let limiter = LoginRateLimiter::new(6000);
        for name in ["u1", "u2", "u3"] {
            assert!(limiter.check(name));
        }
        assert_eq!(limiter.tracked(), 3);

        std::thread::sleep(Duration::from_millis(100));
        limiter.prune();
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_check_prunes_periodically() {
        let limiter = LoginRateLimiter::with_prune_interval(6000, 3);
        assert!(limiter.check("u1"));
        assert!(limiter.check("u2"));
        assert_eq!(limiter.tracked(), 2);

        std::thread::sleep(Duration::from_millis(100));
        // Third check sweeps u1 and u2 before recording u3.
        assert!(limiter.check("u3"));
        assert_eq!(limiter.tracked(), 1);
    }
}
