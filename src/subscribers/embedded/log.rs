//! # LogWriter: tracing-backed event renderer
//!
//! A minimal subscriber that renders incoming [`Event`]s through `tracing`.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see
//! the output.
//!
//! ## Levels
//! - `info`: mode changes, registration, shutdown progress
//! - `warn`: handler failures, too-fast handlers, grace exceeded, subscriber problems
//! - `debug`: interrupts, mode entries, cancellations, backoff, loop exits

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default, Debug)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let id = e.task_id.map(|id| id.as_u64()).unwrap_or(0);
        let mode = e.mode.map(|m| m.as_label()).unwrap_or("-");
        let prev = e.prev_mode.map(|m| m.as_label()).unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::ModeChanged => {
                tracing::info!(seq = e.seq, from = prev, to = mode, "mode changed");
            }
            EventKind::TaskAdded => {
                tracing::info!(seq = e.seq, task, id, mode, "task added");
            }
            EventKind::TaskInterrupted => {
                tracing::debug!(seq = e.seq, task, id, from = prev, to = mode, "task interrupted");
            }
            EventKind::ModeEntered => {
                tracing::debug!(seq = e.seq, task, id, from = prev, to = mode, "mode entered");
            }
            EventKind::HandlerCancelled => {
                tracing::debug!(seq = e.seq, task, mode, elapsed_ms = e.elapsed_ms, "handler cancelled");
            }
            EventKind::HandlerFailed => {
                tracing::warn!(seq = e.seq, task, mode, elapsed_ms = e.elapsed_ms, error = reason, "handler failed");
            }
            EventKind::HandlerTooFast => {
                tracing::warn!(seq = e.seq, task, mode, elapsed_ms = e.elapsed_ms, "handler returned too quickly");
            }
            EventKind::BackoffScheduled => {
                tracing::debug!(
                    seq = e.seq,
                    task,
                    mode,
                    delay_ms = e.delay_ms,
                    failures = e.attempt,
                    error = reason,
                    "backoff scheduled"
                );
            }
            EventKind::TaskStopped => {
                tracing::debug!(seq = e.seq, task, id, "dispatch loop stopped");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(seq = e.seq, "shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!(seq = e.seq, "all tasks stopped within grace");
            }
            EventKind::GraceExceeded => {
                tracing::warn!(seq = e.seq, stuck = reason, "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(seq = e.seq, subscriber = task, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(seq = e.seq, subscriber = task, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
