//! Reconnection logic with exponential backoff
//!
//! Delays between reconnect attempts after a dropped connection.

use std::time::Duration;

/// Reconnection configuration
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum backoff time between attempts
    pub max_backoff: Duration,
    /// Initial backoff time
    pub initial_backoff: Duration,
    /// Maximum number of attempts (None = infinite)
    pub max_attempts: Option<usize>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_backoff: Duration::from_secs(30),
            initial_backoff: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

/// Delay sequence: initial, doubling, capped at max
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    current: Duration,
    attempt: usize,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            current: config.initial_backoff,
            config,
            attempt: 0,
        }
    }

    /// Delay before the next attempt, or None once attempts are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if let Some(max) = self.config.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }
        let delay = self.current;
        self.current = std::cmp::min(self.current * 2, self.config.max_backoff);
        Some(delay)
    }

    /// Back to the initial delay after a successful connection
    pub fn reset(&mut self) {
        self.current = self.config.initial_backoff;
        self.attempt = 0;
    }

    pub fn attempts(&self) -> usize {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_config_default() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_backoff, Duration::from_secs(30));
        assert_eq!(config.initial_backoff, Duration::from_secs(1));
        assert_eq!(config.max_attempts, None);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(ReconnectConfig::default());
        let delays: Vec<u64> = (0..7)
            .map(|_| backoff.next_delay().unwrap().as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_backoff_respects_max_attempts() {
        let mut backoff = Backoff::new(ReconnectConfig {
            max_attempts: Some(3),
            ..Default::default()
        });
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
    }
}
