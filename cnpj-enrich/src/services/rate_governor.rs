//! Fixed-interval throttle for live lookups
//!
//! After a live call completes (success or failure), the next call may not
//! start until `min_interval` has elapsed. No burst capacity, no backoff.
//! Identifiers resolved from the already-queried store never touch the
//! governor, so they incur no delay.

use std::time::Duration;
use tokio::time::Instant;

/// Rate governor owned by a single pipeline run
#[derive(Debug)]
pub struct RateGovernor {
    min_interval: Duration,
    last_call_finished: Option<Instant>,
}

impl RateGovernor {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call_finished: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Time left before the next call may start
    pub fn remaining(&self) -> Duration {
        match self.last_call_finished {
            Some(finished) => self.min_interval.saturating_sub(finished.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Wait if necessary to comply with the interval
    pub async fn wait_turn(&self) {
        let wait_time = self.remaining();
        if !wait_time.is_zero() {
            tracing::debug!("Rate limiting: waiting {:?}", wait_time);
            tokio::time::sleep(wait_time).await;
        }
    }

    /// Record that a live call just completed
    pub fn mark_call_finished(&mut self) {
        self.last_call_finished = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_is_not_delayed() {
        let governor = RateGovernor::new(Duration::from_secs(12));
        assert_eq!(governor.remaining(), Duration::ZERO);
        assert_eq!(governor.min_interval(), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_turn_spaces_calls_by_interval() {
        let mut governor = RateGovernor::new(Duration::from_secs(12));
        let start = Instant::now();

        governor.wait_turn().await;
        governor.mark_call_finished();
        let first = start.elapsed();

        governor.wait_turn().await;
        governor.mark_call_finished();
        let second = start.elapsed();

        governor.wait_turn().await;
        let third = start.elapsed();

        assert_eq!(first, Duration::ZERO);
        assert!(second >= Duration::from_secs(12));
        assert!(third >= Duration::from_secs(24));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_spent_elsewhere_counts_toward_interval() {
        let mut governor = RateGovernor::new(Duration::from_secs(12));
        governor.mark_call_finished();

        tokio::time::sleep(Duration::from_secs(5)).await;
        let remaining = governor.remaining();
        assert!(remaining <= Duration::from_secs(7));
        assert!(remaining > Duration::from_secs(6));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(governor.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_waits() {
        let mut governor = RateGovernor::new(Duration::ZERO);
        let start = Instant::now();
        governor.mark_call_finished();
        governor.wait_turn().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
