use std::time::Duration;

use futures::future::LocalBoxFuture;

/// Host scheduling primitives. Everything runs on one thread; waits are scheduled
/// resumptions, never blocking sleeps.
pub trait Runtime {
    /// Current wall-clock time in epoch milliseconds.
    fn now_ms(&self) -> i64;

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;

    /// Runs `task` to completion in the background.
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
}
