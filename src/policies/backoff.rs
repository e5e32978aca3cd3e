//! # Backoff after failing handlers.
//!
//! When a handler returns a real error (not an interrupt), the dispatch loop
//! pauses before calling it again so a broken sensor or a panicking body does
//! not spin a worker thread. [`BackoffPolicy`] computes that pause from the
//! number of consecutive failures in the current mode:
//!
//! ```text
//! delay(n) = min(first × factor^n, max), then jitter
//! ```
//!
//! The counter resets when a handler completes or the mode changes, and the
//! pause itself is a checkpoint: a mode change cuts it short.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use modevisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(50),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(50));
//! assert_eq!(backoff.next(2), Duration::from_millis(200));
//! assert_eq!(backoff.next(30), Duration::from_secs(1));
//! ```

use std::time::Duration;

use super::JitterPolicy;

/// Pause schedule applied after consecutive handler failures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Pause after the first failure.
    pub first: Duration,
    /// Upper bound for any pause.
    pub max: Duration,
    /// Growth per additional failure (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied to the capped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 100ms`, `factor = 2.0`, `max = 5s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Constant pause of `delay` after every failure.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Pause after `failures` previous consecutive failures (0-based).
    ///
    /// Non-finite or negative intermediate values fall back to `max`, and the
    /// jittered result is never fed back into later calls.
    pub fn next(&self, failures: u32) -> Duration {
        let exp = failures.min(i32::MAX as u32) as i32;
        let base = if exp == 0 || self.factor == 1.0 {
            self.first.min(self.max)
        } else {
            let secs = self.first.as_secs_f64() * self.factor.powi(exp);
            if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
                self.max
            } else {
                Duration::from_secs_f64(secs)
            }
        };

        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(factor: f64, jitter: JitterPolicy) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(5),
            factor,
            jitter,
        }
    }

    #[test]
    fn grows_exponentially_until_cap() {
        let p = policy(2.0, JitterPolicy::None);
        assert_eq!(p.next(0), Duration::from_millis(100));
        assert_eq!(p.next(1), Duration::from_millis(200));
        assert_eq!(p.next(3), Duration::from_millis(800));
        assert_eq!(p.next(6), Duration::from_secs(5));
        assert_eq!(p.next(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn constant_policy_never_changes() {
        let p = BackoffPolicy::constant(Duration::from_millis(40));
        for n in [0, 1, 10, 1000] {
            assert_eq!(p.next(n), Duration::from_millis(40));
        }
    }

    #[test]
    fn first_above_max_is_capped() {
        let p = BackoffPolicy {
            first: Duration::from_secs(10),
            ..policy(1.0, JitterPolicy::None)
        };
        assert_eq!(p.next(0), Duration::from_secs(5));
    }

    #[test]
    fn jitter_stays_within_capped_base() {
        let full = policy(2.0, JitterPolicy::Full);
        let equal = policy(2.0, JitterPolicy::Equal);
        for n in 0..12 {
            let base = policy(2.0, JitterPolicy::None).next(n);
            assert!(full.next(n) <= base);
            let d = equal.next(n);
            let floor = Duration::from_millis(base.as_millis() as u64 / 2);
            assert!(d <= base && d >= floor, "attempt {n}: {d:?} vs base {base:?}");
        }
    }
}
