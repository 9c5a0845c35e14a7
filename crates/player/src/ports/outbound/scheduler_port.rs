//! Scheduling abstraction for delivery timers and animation frames.

use std::time::Duration;

use futures_util::future::BoxFuture;

/// Async sleep and frame pacing.
///
/// Keeps the session free of runtime-specific timer calls so tests can run it
/// under a paused clock.
pub trait SchedulerPort: Send + Sync {
    /// Resolve after `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;

    /// Resolve on the next animation frame, once pending rendering has settled.
    fn next_frame(&self) -> BoxFuture<'static, ()>;
}
