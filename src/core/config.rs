//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings for the supervisor runtime.
//! It is consumed once, by [`Supervisor::builder`](crate::Supervisor::builder).
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1
//! - `min_handler_time = 0s` → too-fast diagnostic disabled
//! - `grace = 0s` → shutdown does not wait for dispatch loops

use std::time::Duration;

use crate::mode::Mode;
use crate::policies::BackoffPolicy;

/// Pause used by default handlers (`ctx.idle()`).
pub(crate) const DEFAULT_IDLE_PAUSE: Duration = Duration::from_millis(20);

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `grace`: maximum wait for dispatch loops to exit on shutdown
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `initial_mode`: mode the supervisor (and every task added before the first broadcast) starts in
/// - `idle_pause`: pause of default handlers
/// - `min_handler_time`: handlers completing faster than this trigger `HandlerTooFast` (`0s` = off)
/// - `backoff`: pause schedule after failing handlers
///
/// All fields are public for flexibility. Prefer the helper accessors to
/// sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for graceful shutdown.
    ///
    /// On shutdown every interrupt token is cancelled and the supervisor waits
    /// up to `grace` for the dispatch loops; past it, `shutdown` returns
    /// `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Global mode before the first broadcast.
    pub initial_mode: Mode,

    /// Pause used by handlers that were not overridden.
    ///
    /// Keeps an idle task from spinning its worker thread.
    pub idle_pause: Duration,

    /// Lower bound on a completed handler's run time before a
    /// `HandlerTooFast` event is published.
    pub min_handler_time: Duration,

    /// Pause schedule after consecutive handler failures.
    pub backoff: BackoffPolicy,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the too-fast threshold as an `Option`.
    ///
    /// - `None` → diagnostic disabled
    /// - `Some(d)` → completed handlers shorter than `d` are reported
    #[inline]
    pub fn handler_floor(&self) -> Option<Duration> {
        if self.min_handler_time.is_zero() {
            None
        } else {
            Some(self.min_handler_time)
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 5s`
    /// - `bus_capacity = 1024`
    /// - `initial_mode = Mode::Disabled`
    /// - `idle_pause = 20ms`
    /// - `min_handler_time = 1ms`
    /// - `backoff = BackoffPolicy::default()` (100ms doubling to 5s)
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            bus_capacity: 1024,
            initial_mode: Mode::Disabled,
            idle_pause: DEFAULT_IDLE_PAUSE,
            min_handler_time: Duration::from_millis(1),
            backoff: BackoffPolicy::default(),
        }
    }
}
