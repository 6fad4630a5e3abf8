use chrono::Utc;

/// Source of wall-clock time in epoch milliseconds.
///
/// Every expiry and window decision in the reliability layer reads time through
/// this trait so it can be driven by a manual clock in tests.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
pub use manual::ManualClock;
