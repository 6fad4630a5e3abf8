use std::time::Duration;

use rand::Rng;

/// Exponential backoff with additive jitter: `2^(attempt-1) * base + U(0..=max_jitter)`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base_ms: u64,
    pub max_jitter_ms: u64,
}

impl Backoff {
    /// Delay to wait after failed attempt number `attempt` (1-based) with a given jitter.
    pub fn delay_with_jitter(&self, attempt: u32, jitter_ms: u64) -> Duration {
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_ms.saturating_mul(exp) + jitter_ms.min(self.max_jitter_ms))
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = if self.max_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.max_jitter_ms)
        };
        self.delay_with_jitter(attempt, jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKOFF: Backoff = Backoff { base_ms: 1_000, max_jitter_ms: 500 };

    #[test]
    fn test_doubles_per_attempt() {
        assert_eq!(BACKOFF.delay_with_jitter(1, 0), Duration::from_millis(1_000));
        assert_eq!(BACKOFF.delay_with_jitter(2, 0), Duration::from_millis(2_000));
        assert_eq!(BACKOFF.delay_with_jitter(3, 0), Duration::from_millis(4_000));
    }

    #[test]
    fn test_jitter_is_capped() {
        assert_eq!(BACKOFF.delay_with_jitter(1, 9_999), Duration::from_millis(1_500));
    }

    #[test]
    fn test_delays_increase_even_with_worst_case_jitter() {
        // highest jitter on attempt n still sits below the floor of attempt n+1
        for attempt in 1..5 {
            assert!(BACKOFF.delay_with_jitter(attempt, 500) < BACKOFF.delay_with_jitter(attempt + 1, 0));
        }
    }

    #[test]
    fn test_random_delay_stays_in_range() {
        for _ in 0..100 {
            let d = BACKOFF.delay(2);
            assert!(d >= Duration::from_millis(2_000) && d <= Duration::from_millis(2_500));
        }
    }
}
