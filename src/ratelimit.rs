use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Fixed-window policy: at most `max_requests` per `window`.
#[derive(Clone, Copy, Debug)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 20,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Seconds until the window resets; always at least 1.
    pub retry_after_secs: u64,
}

/// Store interface injected into the orchestrator. The in-memory store below
/// covers a single process; a durable backend implements the same trait.
pub trait RateLimitStore: Send + Sync {
    fn check(&self, key: &str, policy: RateLimitPolicy) -> RateLimitDecision;
}

struct WindowState {
    count: u32,
    reset_at: Instant,
}

/// Process-lifetime counter map. Entries expire by timestamp comparison on
/// the next check; no teardown.
#[derive(Default)]
pub struct MemoryRateLimiter {
    windows: Mutex<HashMap<String, WindowState>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for MemoryRateLimiter {
    fn check(&self, key: &str, policy: RateLimitPolicy) -> RateLimitDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        let expired = windows
            .get(key)
            .map(|state| now >= state.reset_at)
            .unwrap_or(true);
        if expired {
            windows.insert(
                key.to_string(),
                WindowState {
                    count: 1,
                    reset_at: now + policy.window,
                },
            );
            return RateLimitDecision {
                allowed: true,
                remaining: policy.max_requests.saturating_sub(1),
                retry_after_secs: secs_until(now + policy.window, now),
            };
        }

        let state = windows.get_mut(key).expect("window state present");
        if state.count >= policy.max_requests {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                retry_after_secs: secs_until(state.reset_at, now),
            };
        }

        state.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: policy.max_requests.saturating_sub(state.count),
            retry_after_secs: secs_until(state.reset_at, now),
        }
    }
}

fn secs_until(reset_at: Instant, now: Instant) -> u64 {
    let secs = reset_at.saturating_duration_since(now).as_secs_f64().ceil() as u64;
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{MemoryRateLimiter, RateLimitPolicy, RateLimitStore};

    fn policy(max: u32, window_ms: u64) -> RateLimitPolicy {
        RateLimitPolicy {
            window: Duration::from_millis(window_ms),
            max_requests: max,
        }
    }

    #[test]
    fn allows_up_to_max_then_denies() {
        let store = MemoryRateLimiter::new();
        let p = policy(3, 60_000);
        for expected_remaining in [2, 1, 0] {
            let decision = store.check("parse:1.2.3.4", p);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }
        let denied = store.check("parse:1.2.3.4", p);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert!(denied.retry_after_secs >= 1);
    }

    #[test]
    fn keys_are_independent() {
        let store = MemoryRateLimiter::new();
        let p = policy(1, 60_000);
        assert!(store.check("parse:a", p).allowed);
        assert!(store.check("parse:b", p).allowed);
        assert!(!store.check("parse:a", p).allowed);
    }

    #[test]
    fn window_expiry_resets_the_counter() {
        let store = MemoryRateLimiter::new();
        let p = policy(1, 10);
        assert!(store.check("parse:x", p).allowed);
        assert!(!store.check("parse:x", p).allowed);
        std::thread::sleep(Duration::from_millis(20));
        assert!(store.check("parse:x", p).allowed);
    }
}
