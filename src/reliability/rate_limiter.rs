use std::collections::HashMap;

use parking_lot::Mutex;

/// Fixed-window counter for one conversation.
#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    count: u32,
    reset_at: i64,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Rejected { retry_after_ms: u64 },
}

/// Per-conversation fixed-window rate limiter.
///
/// A window opens on the first request and resets once `now > reset_at`.
/// The count never exceeds `max_requests` inside a window.
pub struct RateLimiter {
    max_requests: u32,
    window_ms: i64,
    windows: Mutex<HashMap<String, RateLimitWindow>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_ms: i64) -> Self {
        Self { max_requests, window_ms, windows: Mutex::new(HashMap::new()) }
    }

    /// Counts one request for `conversation_id` if the window has room.
    pub fn check(&self, conversation_id: &str, now: i64) -> Admission {
        let mut windows = self.windows.lock();
        let window = windows
            .entry(conversation_id.to_string())
            .or_insert(RateLimitWindow { count: 0, reset_at: now + self.window_ms });

        if now > window.reset_at {
            *window = RateLimitWindow { count: 0, reset_at: now + self.window_ms };
        }

        if window.count >= self.max_requests {
            return Admission::Rejected { retry_after_ms: (window.reset_at - now).max(0) as u64 };
        }

        window.count += 1;
        Admission::Allowed { remaining: self.max_requests - window.count }
    }

    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    /// Drops windows that have already reset.
    pub fn sweep(&self, now: i64) -> usize {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| now <= w.reset_at);
        before - windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_ceiling_then_rejects() {
        let limiter = RateLimiter::new(3, 60_000);
        for expected in [2, 1, 0] {
            assert_eq!(limiter.check("c1", 1_000), Admission::Allowed { remaining: expected });
        }
        assert_eq!(
            limiter.check("c1", 11_000),
            Admission::Rejected { retry_after_ms: 50_000 }
        );
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = RateLimiter::new(1, 60_000);
        assert!(matches!(limiter.check("c1", 0), Admission::Allowed { .. }));
        assert!(matches!(limiter.check("c1", 60_000), Admission::Rejected { .. }));
        assert!(matches!(limiter.check("c1", 60_001), Admission::Allowed { .. }));
    }

    #[test]
    fn test_conversations_are_independent() {
        let limiter = RateLimiter::new(1, 60_000);
        assert!(matches!(limiter.check("a", 0), Admission::Allowed { .. }));
        assert!(matches!(limiter.check("b", 0), Admission::Allowed { .. }));
        assert!(matches!(limiter.check("a", 1), Admission::Rejected { .. }));
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn test_sweep_removes_reset_windows() {
        let limiter = RateLimiter::new(5, 1_000);
        limiter.check("old", 0);
        limiter.check("new", 5_000);
        assert_eq!(limiter.sweep(5_500), 1);
        assert_eq!(limiter.len(), 1);
    }
}
