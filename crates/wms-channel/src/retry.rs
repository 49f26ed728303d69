//! Reconnect delay policies.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay between a channel closing and the next connection attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(5000);

/// How a channel schedules reconnects after its transport closes.
///
/// `Fixed` waits the same delay every time and never gives up, even when the
/// failure is permanent (e.g. a revoked credential). `Backoff` doubles the
/// delay per consecutive failure up to `max_ms` and, when `max_attempts` is
/// set, gives up once that many attempts in a row have failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryPolicy {
    Fixed {
        delay_ms: u64,
    },
    Backoff {
        initial_ms: u64,
        max_ms: u64,
        #[serde(default)]
        max_attempts: Option<u32>,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::fixed(DEFAULT_RETRY_DELAY)
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        RetryPolicy::Fixed {
            delay_ms: millis(delay),
        }
    }

    pub fn backoff(initial: Duration, max: Duration, max_attempts: Option<u32>) -> Self {
        RetryPolicy::Backoff {
            initial_ms: millis(initial),
            max_ms: millis(max),
            max_attempts,
        }
    }

    /// Delay before reconnect attempt number `attempt` (1-based, counting
    /// consecutive failures). `None` means stop retrying.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            RetryPolicy::Fixed { delay_ms } => Some(Duration::from_millis(delay_ms)),
            RetryPolicy::Backoff {
                initial_ms,
                max_ms,
                max_attempts,
            } => {
                if max_attempts.is_some_and(|max| attempt > max) {
                    return None;
                }
                // 1x, 2x, 4x, ... capped at max
                let exp = attempt.saturating_sub(1).min(30);
                let delay = Duration::from_millis(initial_ms)
                    .saturating_mul(1u32 << exp)
                    .min(Duration::from_millis(max_ms));
                Some(delay)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fixed_five_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy, RetryPolicy::fixed(Duration::from_secs(5)));
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn huge_durations_saturate() {
        assert_eq!(
            RetryPolicy::fixed(Duration::MAX),
            RetryPolicy::Fixed { delay_ms: u64::MAX }
        );
        assert_eq!(
            RetryPolicy::backoff(Duration::from_millis(10), Duration::MAX, None),
            RetryPolicy::Backoff {
                initial_ms: 10,
                max_ms: u64::MAX,
                max_attempts: None,
            }
        );
    }

    #[test]
    fn fixed_never_gives_up() {
        let policy = RetryPolicy::default();
        for attempt in [1, 2, 10, 1_000, u32::MAX] {
            assert_eq!(policy.delay_for(attempt), Some(DEFAULT_RETRY_DELAY));
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy =
            RetryPolicy::backoff(Duration::from_secs(1), Duration::from_secs(15), None);
        let delays: Vec<_> = (1..=6)
            .map(|a| policy.delay_for(a).unwrap().as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 15, 15]);
        assert_eq!(policy.delay_for(u32::MAX), Some(Duration::from_secs(15)));
    }

    #[test]
    fn backoff_gives_up_after_max_attempts() {
        let policy =
            RetryPolicy::backoff(Duration::from_secs(1), Duration::from_secs(4), Some(3));
        assert!(policy.delay_for(3).is_some());
        assert_eq!(policy.delay_for(4), None);
    }

    #[test]
    fn deserializes_from_config() {
        let fixed: RetryPolicy =
            serde_json::from_str(r#"{"kind":"fixed","delay_ms":250}"#).unwrap();
        assert_eq!(fixed, RetryPolicy::fixed(Duration::from_millis(250)));

        let backoff: RetryPolicy =
            serde_json::from_str(r#"{"kind":"backoff","initial_ms":500,"max_ms":8000}"#)
                .unwrap();
        assert_eq!(
            backoff,
            RetryPolicy::backoff(Duration::from_millis(500), Duration::from_secs(8), None)
        );
    }
}
