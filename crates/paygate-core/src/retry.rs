//! Retry policy for the consumer loop.
//!
//! The policy is a plain value object: it computes the delay schedule but
//! never sleeps. The worker owns the clock.

use std::str::FromStr;
use std::time::Duration;

/// How inter-attempt delays grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayStrategy {
    /// The same base delay before every retry.
    Fixed,
    /// Exponential: base delay doubled after each failed attempt.
    Backoff,
}

impl FromStr for DelayStrategy {
    type Err = RetryConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "backoff" => Ok(Self::Backoff),
            other => Err(RetryConfigError::UnknownStrategy(other.to_owned())),
        }
    }
}

/// Invalid retry configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryConfigError {
    /// Delay strategy was neither `fixed` nor `backoff`.
    #[error("unknown delay strategy {0:?}, expected \"fixed\" or \"backoff\"")]
    UnknownStrategy(String),
}

/// Bounded retry with a configurable delay schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub attempts: u32,
    /// Delay growth strategy.
    pub strategy: DelayStrategy,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single inter-attempt delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            strategy: DelayStrategy::Fixed,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// Fixed strategy returns the base delay; backoff doubles it per failed
    /// attempt. Both are capped at [`max_delay`](Self::max_delay).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let raw = match self.strategy {
            DelayStrategy::Fixed => self.base_delay,
            DelayStrategy::Backoff => {
                // Exponent saturates well past any sane max_delay.
                let exp = attempt.saturating_sub(1).min(20);
                self.base_delay.saturating_mul(1 << exp)
            }
        };
        raw.min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_delay_is_constant() {
        let policy = RetryPolicy {
            attempts: 5,
            strategy: DelayStrategy::Fixed,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        };
        for attempt in 1..=4 {
            assert_eq!(policy.delay_after(attempt), Duration::from_millis(200));
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            attempts: 6,
            strategy: DelayStrategy::Backoff,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_secs(1));
        assert_eq!(policy.delay_after(3), Duration::from_secs(2));
        // 4s would exceed the cap.
        assert_eq!(policy.delay_after(4), Duration::from_secs(3));
        assert_eq!(policy.delay_after(5), Duration::from_secs(3));
    }

    #[test]
    fn strategy_parses() {
        assert_eq!("fixed".parse::<DelayStrategy>(), Ok(DelayStrategy::Fixed));
        assert_eq!(
            "backoff".parse::<DelayStrategy>(),
            Ok(DelayStrategy::Backoff)
        );
        assert!("jitter".parse::<DelayStrategy>().is_err());
    }

    #[test]
    fn defaults_match_deployment_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(5));
    }
}
