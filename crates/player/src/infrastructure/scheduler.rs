//! Tokio-backed scheduler.

use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::ports::outbound::SchedulerPort;

/// Roughly 60 frames per second.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Scheduler using tokio timers. Headless, so an animation frame is a fixed
/// frame interval.
#[derive(Debug, Clone, Copy)]
pub struct TokioScheduler {
    frame_interval: Duration,
}

impl TokioScheduler {
    pub fn new(frame_interval: Duration) -> Self {
        Self { frame_interval }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl SchedulerPort for TokioScheduler {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }

    fn next_frame(&self) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(self.frame_interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn next_frame_waits_one_frame_interval() {
        let scheduler = TokioScheduler::new(Duration::from_millis(20));
        let start = tokio::time::Instant::now();
        scheduler.next_frame().await;
        assert_eq!(start.elapsed(), Duration::from_millis(20));
    }
}
