//! # Run a single handler invocation.
//!
//! Dispatches one call to the handler matching `ctx.mode()`, contains panics,
//! and publishes what happened to the [`Bus`].
//!
//! ## Event flow
//! ```text
//! Ok(())                  → HandlerTooFast (only when faster than the floor) → Completed
//! Err(Interrupted)        → HandlerCancelled                                → Cancelled
//! Err(other) / panic      → HandlerFailed                                   → Failed(err)
//! ```
//!
//! A panic unwinds the handler's future, so resource guards it held are
//! dropped (released) before the outcome is reported.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;

use crate::{
    error::TaskError,
    events::{Bus, Event, EventKind},
    mode::Mode,
    tasks::{Task, TaskContext},
};

/// Result of one handler invocation, as seen by the dispatch loop.
#[derive(Debug)]
pub enum HandlerOutcome {
    /// The handler returned `Ok(())`.
    Completed,
    /// The handler gave up after an interrupt.
    Cancelled,
    /// The handler returned an error or panicked.
    Failed(TaskError),
}

/// Runs the handler for `ctx.mode()` once.
pub(crate) async fn run_handler(
    task: &mut dyn Task,
    ctx: &TaskContext,
    floor: Option<Duration>,
    bus: &Bus,
) -> HandlerOutcome {
    let started = Instant::now();
    let fut = match ctx.mode() {
        Mode::Disabled => task.disabled(ctx),
        Mode::Autonomous => task.autonomous(ctx),
        Mode::Teleoperated => task.teleop(ctx),
    };
    let res = AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)));
    let elapsed = started.elapsed();

    match res {
        Ok(()) => {
            if let Some(min) = floor.filter(|min| elapsed < *min) {
                tracing::warn!(
                    task = %ctx.name(),
                    mode = %ctx.mode(),
                    elapsed_us = elapsed.as_micros() as u64,
                    min_us = min.as_micros() as u64,
                    "handler returned faster than the minimum handler time"
                );
                publish(bus, EventKind::HandlerTooFast, ctx, elapsed);
            }
            HandlerOutcome::Completed
        }
        Err(TaskError::Interrupted) => {
            publish(bus, EventKind::HandlerCancelled, ctx, elapsed);
            HandlerOutcome::Cancelled
        }
        Err(e) => {
            bus.publish(handler_event(EventKind::HandlerFailed, ctx, elapsed).with_reason(e.to_string()));
            HandlerOutcome::Failed(e)
        }
    }
}

fn handler_event(kind: EventKind, ctx: &TaskContext, elapsed: Duration) -> Event {
    Event::new(kind)
        .with_task(ctx.name())
        .with_task_id(ctx.id())
        .with_mode(ctx.mode())
        .with_elapsed(elapsed)
}

fn publish(bus: &Bus, kind: EventKind, ctx: &TaskContext, elapsed: Duration) {
    bus.publish(handler_event(kind, ctx, elapsed));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskFn;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn ctx(mode: Mode) -> (TaskContext, CancellationToken) {
        let token = CancellationToken::new();
        (TaskContext::detached("dispatcher", mode, token.clone()), token)
    }

    #[tokio::test]
    async fn dispatches_by_mode_and_flags_fast_handlers() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let mut task = TaskFn::new("dispatcher")
            .on_autonomous(|_ctx| async { Ok(()) })
            .on_teleop(|_ctx| async { Err(TaskError::fail("teleop only")) });

        let (auto, _t) = ctx(Mode::Autonomous);
        let out = run_handler(&mut task, &auto, Some(Duration::from_secs(1)), &bus).await;
        assert!(matches!(out, HandlerOutcome::Completed));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::HandlerTooFast);
        assert_eq!(ev.mode, Some(Mode::Autonomous));

        let (teleop, _t) = ctx(Mode::Teleoperated);
        let out = run_handler(&mut task, &teleop, None, &bus).await;
        assert!(matches!(out, HandlerOutcome::Failed(TaskError::Fail { .. })));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::HandlerFailed);
        assert_eq!(ev.reason.as_deref(), Some("handler failed: teleop only"));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn too_fast_handler_is_logged_without_subscribers() {
        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        let bus = Bus::new(16);
        let mut task = TaskFn::new("spinner").on_teleop(|_ctx| async { Ok(()) });
        let (teleop, _t) = ctx(Mode::Teleoperated);
        let out = run_handler(&mut task, &teleop, Some(Duration::from_secs(1)), &bus).await;
        assert!(matches!(out, HandlerOutcome::Completed));

        let text = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert!(text.contains("WARN"), "{text}");
        assert!(text.contains("faster than the minimum handler time"), "{text}");
        assert!(text.contains("mode=teleop"), "{text}");
    }

    #[tokio::test]
    async fn interrupt_is_cancelled_not_failed() {
        let bus = Bus::new(16);
        let mut task = TaskFn::new("idle");
        let (disabled, token) = ctx(Mode::Disabled);
        token.cancel();

        let out = run_handler(&mut task, &disabled, None, &bus).await;
        assert!(matches!(out, HandlerOutcome::Cancelled));
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let bus = Bus::new(16);
        let mut task = TaskFn::new("panicky").on_disabled(|_ctx| async {
            if true {
                panic!("sensor exploded");
            }
            Ok(())
        });
        let (disabled, _t) = ctx(Mode::Disabled);

        match run_handler(&mut task, &disabled, None, &bus).await {
            HandlerOutcome::Failed(TaskError::Panicked { info }) => assert_eq!(info, "sensor exploded"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
