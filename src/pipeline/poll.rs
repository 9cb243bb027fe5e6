//! Cancellable handle for the run-status polling loop

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Owned by the driver while a run is in `checking`. Dropping the handle
/// cancels it, so every exit path releases the timer.
#[derive(Debug)]
pub struct PollHandle {
    token: CancellationToken,
    interval: Duration,
}

impl PollHandle {
    /// Start a poll handle that is also cancelled when `parent` is
    pub fn start(parent: &CancellationToken, interval: Duration) -> Self {
        Self {
            token: parent.child_token(),
            interval,
        }
    }

    /// Ticker whose first tick fires one full interval from now
    pub fn ticker(&self) -> Interval {
        // tokio rejects a zero period
        let period = self.interval.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_cancellation_reaches_handle() {
        let parent = CancellationToken::new();
        let handle = PollHandle::start(&parent, Duration::from_secs(5));
        assert!(!handle.is_cancelled());
        parent.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_drop_cancels_token() {
        let parent = CancellationToken::new();
        let handle = PollHandle::start(&parent, Duration::from_secs(5));
        let token = handle.token();
        drop(handle);
        assert!(token.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_one_interval() {
        let parent = CancellationToken::new();
        let handle = PollHandle::start(&parent, Duration::from_secs(5));
        let start = Instant::now();
        let mut ticker = handle.ticker();
        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }
}
