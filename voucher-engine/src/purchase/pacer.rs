//! Burst pacing for upstream transactions
//!
//! The provider throttles rapid-fire issue calls, so after every
//! `window` successful transactions the batch loop sleeps for `pause`.
//! Failures do not count toward the window.

use std::time::Duration;
use tracing::debug;

pub struct Pacer {
    window: u32,
    pause: Duration,
    successes: u32,
}

impl Pacer {
    pub fn new(window: u32, pause: Duration) -> Self {
        Self {
            window,
            pause,
            successes: 0,
        }
    }

    /// Record one successful transaction, sleeping if the window filled
    pub async fn on_success(&mut self) {
        self.successes += 1;
        if self.window > 0 && self.successes % self.window == 0 && !self.pause.is_zero() {
            debug!(successes = self.successes, pause_ms = self.pause.as_millis() as u64, "Pacing batch");
            tokio::time::sleep(self.pause).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn pauses_after_each_full_window() {
        let mut pacer = Pacer::new(2, Duration::from_millis(100));
        let start = Instant::now();
        for _ in 0..4 {
            pacer.on_success().await;
        }
        // Windows fill at the 2nd and 4th success
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_pause_never_sleeps() {
        let mut pacer = Pacer::new(2, Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10 {
            pacer.on_success().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_window_does_not_pause() {
        let mut pacer = Pacer::new(10, Duration::from_millis(100));
        let start = Instant::now();
        for _ in 0..9 {
            pacer.on_success().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
