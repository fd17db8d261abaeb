/*
[INPUT]:  Reconnect configuration and the running attempt count
[OUTPUT]: Next backoff delay, or None once the attempt cap is reached
[POS]:    WebSocket layer - reconnection policy
[UPDATE]: When changing backoff shape, jitter or attempt caps
*/

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to each delay
    pub max_jitter: Duration,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

/// Capped exponential backoff with jitter.
///
/// The n-th scheduled attempt (0-based) waits
/// `min(max_delay, base_delay * 2^n) + jitter`.
#[derive(Debug, Clone)]
pub struct ReconnectStrategy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectStrategy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Attempts scheduled since the last successful connection
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.config
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
    }

    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(31);
        self.config
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay)
    }

    /// Schedule the next attempt and return its delay
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = self.base_delay(self.attempts) + self.jitter();
        self.attempts += 1;
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.config.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(max_attempts: Option<u32>) -> ReconnectConfig {
        ReconnectConfig {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::ZERO,
            max_attempts,
        }
    }

    #[test]
    fn reconnect_backoff_clamps_at_max() {
        let mut strategy = ReconnectStrategy::new(no_jitter(None));
        let delays: Vec<_> = (0..7).filter_map(|_| strategy.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
                Duration::from_secs(30),
                Duration::from_secs(30),
            ]
        );
        assert_eq!(strategy.attempts(), 7);
    }

    #[test]
    fn reconnect_stops_at_attempt_cap() {
        let mut strategy = ReconnectStrategy::new(no_jitter(Some(2)));
        assert!(strategy.next_delay().is_some());
        assert!(strategy.next_delay().is_some());
        assert!(strategy.is_exhausted());
        assert_eq!(strategy.next_delay(), None);
    }

    #[test]
    fn reconnect_reset_restarts_backoff() {
        let mut strategy = ReconnectStrategy::new(no_jitter(Some(3)));
        strategy.next_delay();
        strategy.next_delay();
        strategy.reset();
        assert_eq!(strategy.attempts(), 0);
        assert_eq!(strategy.next_delay(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn reconnect_jitter_is_bounded() {
        let mut strategy = ReconnectStrategy::new(ReconnectConfig {
            max_jitter: Duration::from_millis(250),
            ..no_jitter(None)
        });
        let delay = strategy.next_delay().unwrap();
        assert!(delay >= Duration::from_secs(1));
        assert!(delay < Duration::from_millis(1250));
    }

    #[test]
    fn reconnect_unlimited_never_exhausts() {
        let mut strategy = ReconnectStrategy::new(no_jitter(None));
        for _ in 0..1000 {
            assert!(strategy.next_delay().is_some());
        }
    }
}
