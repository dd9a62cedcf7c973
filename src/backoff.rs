//! Reconnection backoff schedule for the agent loop.
//!
//! One instance lives for the whole agent process. The schedule is advanced
//! before every dial and reset only after a confirmed subscription, so
//! repeated short-lived connections keep accumulating delay.

use std::time::Duration;

const FLOOR: Duration = Duration::from_secs(1);
const CEILING: Duration = Duration::from_secs(64);

/// Exponential reconnect delay: 1s, 2s, 4s, ... capped at 64s.
#[derive(Debug, Default)]
pub struct ReconnectBackoff {
    timeout: Duration,
}

impl ReconnectBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the schedule: 1s from a cleared state, doubling afterwards,
    /// clamped at the ceiling.
    pub fn next(&mut self) {
        if self.timeout.is_zero() {
            self.timeout = FLOOR;
        } else {
            self.timeout = (self.timeout * 2).min(CEILING);
        }
    }

    /// Current delay without advancing the schedule.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reset the schedule to zero.
    pub fn clear(&mut self) {
        self.timeout = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_schedule_from_cleared_state() {
        let mut backoff = ReconnectBackoff::new();
        assert_eq!(backoff.timeout(), Duration::ZERO);

        let expected = [1u64, 2, 4, 8, 16, 32, 64, 64, 64];
        for secs in expected {
            backoff.next();
            assert_eq!(backoff.timeout(), Duration::from_secs(secs));
        }
    }

    #[test]
    fn test_timeout_does_not_advance() {
        let mut backoff = ReconnectBackoff::new();
        backoff.next();

        assert_eq!(backoff.timeout(), Duration::from_secs(1));
        assert_eq!(backoff.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_clear_resets_schedule() {
        let mut backoff = ReconnectBackoff::new();
        for _ in 0..5 {
            backoff.next();
        }
        assert_eq!(backoff.timeout(), Duration::from_secs(16));

        backoff.clear();
        assert_eq!(backoff.timeout(), Duration::ZERO);

        backoff.next();
        assert_eq!(backoff.timeout(), Duration::from_secs(1));
    }

    proptest! {
        #[test]
        fn prop_monotonic_and_capped(steps in 1usize..64) {
            let mut backoff = ReconnectBackoff::new();
            let mut previous = Duration::ZERO;

            for _ in 0..steps {
                backoff.next();
                let current = backoff.timeout();
                prop_assert!(current >= previous);
                prop_assert!(current >= Duration::from_secs(1));
                prop_assert!(current <= Duration::from_secs(64));
                previous = current;
            }
        }
    }
}
