//! Backoff scheduling
//!
//! Pure function of (attempts made, policy). No delay precedes the first
//! attempt; attempt `k + 1` waits `base * factor^(k - 1)`, capped at
//! `max_delay`.

use sav_common::config::RetrySettings;
use std::time::Duration;

/// Retry policy with exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Backoff multiplier for exponential backoff
    pub growth_factor: u32,
    /// Maximum backoff duration
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            growth_factor: 2,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Forward once, never retry
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            growth_factor: settings.growth_factor.max(1),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

/// Scheduling decision for the next attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Wait this long, then attempt again
    Proceed(Duration),
    /// Attempt budget exhausted
    Stop,
}

/// Decide whether another attempt is allowed after `attempts_made` attempts
pub fn next_attempt(attempts_made: u32, policy: &RetryPolicy) -> Backoff {
    if attempts_made >= policy.max_attempts {
        return Backoff::Stop;
    }
    if attempts_made == 0 {
        return Backoff::Proceed(Duration::ZERO);
    }

    let multiplier = policy.growth_factor.saturating_pow(attempts_made - 1);
    let delay = policy.base_delay.saturating_mul(multiplier);
    Backoff::Proceed(delay.min(policy.max_delay))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();

        assert_eq!(next_attempt(0, &policy), Backoff::Proceed(Duration::ZERO));
        assert_eq!(next_attempt(1, &policy), Backoff::Proceed(Duration::from_millis(1000)));
        assert_eq!(next_attempt(2, &policy), Backoff::Proceed(Duration::from_millis(2000)));
        assert_eq!(next_attempt(3, &policy), Backoff::Stop);
        assert_eq!(next_attempt(10, &policy), Backoff::Stop);
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(1000),
            growth_factor: 2,
            max_delay: Duration::from_millis(5000),
        };

        assert_eq!(next_attempt(3, &policy), Backoff::Proceed(Duration::from_millis(4000)));
        assert_eq!(next_attempt(4, &policy), Backoff::Proceed(Duration::from_millis(5000)));
        assert_eq!(next_attempt(9, &policy), Backoff::Proceed(Duration::from_millis(5000)));
    }

    #[test]
    fn test_huge_exponent_saturates() {
        let policy = RetryPolicy {
            max_attempts: u32::MAX,
            max_delay: Duration::MAX,
            ..RetryPolicy::default()
        };

        assert!(matches!(next_attempt(200, &policy), Backoff::Proceed(d) if d > Duration::from_secs(1)));
    }

    #[test]
    fn test_single_attempt_policy() {
        let policy = RetryPolicy::single_attempt();
        assert_eq!(next_attempt(0, &policy), Backoff::Proceed(Duration::ZERO));
        assert_eq!(next_attempt(1, &policy), Backoff::Stop);
    }

    #[test]
    fn test_from_settings() {
        let settings = RetrySettings {
            max_attempts: 5,
            base_delay_ms: 250,
            growth_factor: 3,
            max_delay_ms: 10_000,
        };
        let policy = RetryPolicy::from(&settings);

        assert_eq!(policy.max_attempts, 5);
        assert_eq!(next_attempt(2, &policy), Backoff::Proceed(Duration::from_millis(750)));
    }
}
