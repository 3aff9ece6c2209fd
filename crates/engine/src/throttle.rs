//! Send throttle: fixed pause after every dispatch attempt.
//!
//! Keeps the outbound rate on the messaging surface low. The pause applies
//! after failures as well as successes.

use std::time::Duration;

use herald_common::config::DEFAULT_SEND_INTERVAL_SECS;

/// Fixed-interval throttle between sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendThrottle {
    interval: Duration,
}

impl SendThrottle {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// No pause at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait out the interval.
    pub async fn pause(&self) {
        if self.interval.is_zero() {
            return;
        }
        tracing::trace!(interval_ms = self.interval.as_millis() as u64, "Throttling");
        tokio::time::sleep(self.interval).await;
    }
}

impl Default for SendThrottle {
    fn default() -> Self {
        Self::from_secs(DEFAULT_SEND_INTERVAL_SECS)
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    #[test]
    fn test_default_interval() {
        assert_eq!(SendThrottle::default().interval(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_waits_interval() {
        let throttle = SendThrottle::from_secs(5);
        let started = Instant::now();
        throttle.pause().await;
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_none_does_not_wait() {
        let started = Instant::now();
        SendThrottle::none().pause().await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
