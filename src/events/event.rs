//! # Runtime events emitted by the supervisor and dispatch loops.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Mode events**: a broadcast changed the global mode and interrupted tasks
//! - **Handler events**: what happened to one handler invocation
//! - **Shutdown events**: grace handling at the end of the run
//! - **Subscriber events**: delivery problems in the fan-out layer
//!
//! The [`Event`] struct carries additional metadata such as timestamps, task
//! name and id, modes, reasons and durations.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use modevisor::{Event, EventKind, Mode};
//!
//! let ev = Event::new(EventKind::HandlerFailed)
//!     .with_task("drive")
//!     .with_mode(Mode::Autonomous)
//!     .with_reason("encoder timeout")
//!     .with_elapsed(Duration::from_millis(12));
//!
//! assert_eq!(ev.kind, EventKind::HandlerFailed);
//! assert_eq!(ev.task.as_deref(), Some("drive"));
//! assert_eq!(ev.mode, Some(Mode::Autonomous));
//! assert_eq!(ev.elapsed_ms, Some(12));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::mode::Mode;
use crate::tasks::TaskId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Mode events ===
    /// The supervisor's global mode changed.
    ///
    /// Sets:
    /// - `mode`: new mode
    /// - `prev_mode`: previous mode
    ModeChanged,

    /// A task was registered and its dispatch loop spawned.
    ///
    /// Sets:
    /// - `task`, `task_id`
    /// - `mode`: mode assigned at registration
    TaskAdded,

    /// A broadcast interrupted one task (its previous mode differed).
    ///
    /// Sets:
    /// - `task`, `task_id`
    /// - `mode`: newly assigned mode
    /// - `prev_mode`: mode the task was in
    TaskInterrupted,

    /// A dispatch loop entered a mode different from its last one.
    ///
    /// Sets:
    /// - `task`, `task_id`
    /// - `mode`: entered mode
    /// - `prev_mode`: previous mode (absent on the first entry)
    ModeEntered,

    // === Handler events ===
    /// A handler returned `TaskError::Interrupted`.
    ///
    /// Sets:
    /// - `task`, `task_id`, `mode`
    /// - `elapsed_ms`: handler run time
    HandlerCancelled,

    /// A handler returned an error or panicked.
    ///
    /// Sets:
    /// - `task`, `task_id`, `mode`
    /// - `reason`: error or panic message
    /// - `elapsed_ms`: handler run time
    HandlerFailed,

    /// A handler completed faster than `Config::min_handler_time`.
    ///
    /// Sets:
    /// - `task`, `task_id`, `mode`
    /// - `elapsed_ms`: handler run time
    HandlerTooFast,

    /// A pause was scheduled after a failed handler.
    ///
    /// Sets:
    /// - `task`, `task_id`, `mode`
    /// - `delay_ms`: pause before the next invocation
    /// - `attempt`: consecutive failures so far (1-based)
    /// - `reason`: last failure message
    BackoffScheduled,

    /// A dispatch loop exited (shutdown).
    ///
    /// Sets:
    /// - `task`, `task_id`
    TaskStopped,

    // === Shutdown events ===
    /// Shutdown requested (explicit call or OS signal).
    ShutdownRequested,

    /// All dispatch loops stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some dispatch loops did not stop in time.
    ///
    /// Sets:
    /// - `reason`: comma-separated names of stuck tasks
    GraceExceeded,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::ModeChanged => "mode_changed",
            EventKind::TaskAdded => "task_added",
            EventKind::TaskInterrupted => "task_interrupted",
            EventKind::ModeEntered => "mode_entered",
            EventKind::HandlerCancelled => "handler_cancelled",
            EventKind::HandlerFailed => "handler_failed",
            EventKind::HandlerTooFast => "handler_too_fast",
            EventKind::BackoffScheduled => "backoff_scheduled",
            EventKind::TaskStopped => "task_stopped",
            EventKind::ShutdownRequested => "shutdown_requested",
            EventKind::AllStoppedWithin => "all_stopped_within",
            EventKind::GraceExceeded => "grace_exceeded",
            EventKind::SubscriberPanicked => "subscriber_panicked",
            EventKind::SubscriberOverflow => "subscriber_overflow",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task (or subscriber), if applicable.
    pub task: Option<Arc<str>>,
    /// Id of the task, if applicable.
    pub task_id: Option<TaskId>,
    /// Mode the event refers to.
    pub mode: Option<Mode>,
    /// Mode before the change, for transition events.
    pub prev_mode: Option<Mode>,
    /// Handler run time in milliseconds (compact).
    pub elapsed_ms: Option<u32>,
    /// Backoff delay before next invocation in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Consecutive failure count.
    pub attempt: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

#[inline]
fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            task_id: None,
            mode: None,
            prev_mode: None,
            elapsed_ms: None,
            delay_ms: None,
            attempt: None,
            reason: None,
        }
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a task id.
    #[inline]
    pub fn with_task_id(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }

    /// Attaches the mode.
    #[inline]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Attaches the previous mode.
    #[inline]
    pub fn with_prev_mode(mut self, mode: Mode) -> Self {
        self.prev_mode = Some(mode);
        self
    }

    /// Attaches a handler run time (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a failure count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// True for events produced by the subscriber layer itself.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::ModeChanged);
        let b = Event::new(EventKind::ModeChanged);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn durations_are_clamped_to_u32_millis() {
        let ev = Event::new(EventKind::BackoffScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn subscriber_helpers_set_kind_and_name() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert!(ev.is_subscriber_event());
        assert_eq!(ev.task.as_deref(), Some("audit"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));
        assert!(!Event::new(EventKind::TaskAdded).is_subscriber_event());
    }
}
