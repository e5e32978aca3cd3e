//! # TaskActor: one task's dispatch loop.
//!
//! Drives a single [`Task`] for the lifetime of the supervisor: acknowledge
//! the pending interrupt, read the mode, run the matching handler, repeat.
//!
//! ## Architecture
//! ```text
//! Supervisor::add_task ──► TaskActor::run()
//!
//! loop {
//!   ├─► runtime cancelled? → break
//!   ├─► (mode, token) = slot.acknowledge()
//!   ├─► mode differs from last entry → publish ModeEntered, reset failures
//!   ├─► run_handler(task, ctx) ─────► task.disabled / autonomous / teleop
//!   │       ├─ Completed → reset failures
//!   │       ├─ Cancelled → (loop re-reads the mode)
//!   │       └─ Failed    → publish BackoffScheduled
//!   │                      └─► ctx.sleep(backoff.next(failures)) (cut short by a mode change)
//!   └─► yield
//! }
//! publish TaskStopped
//! ```
//!
//! ## Rules
//! - Handlers of one task run **sequentially** (never concurrent)
//! - Handler errors and panics never end the loop; only shutdown does
//! - The failure counter resets on a completed invocation or a new mode epoch

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        runner::{HandlerOutcome, run_handler},
        slot::ModeSlot,
    },
    events::{Bus, Event, EventKind},
    mode::Mode,
    policies::BackoffPolicy,
    tasks::{TaskContext, TaskId, TaskRef},
};

/// Settings the supervisor passes to every dispatch loop.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TaskActorParams {
    /// Pause of default handlers.
    pub idle_pause: Duration,
    /// Too-fast threshold (`None` = off).
    pub handler_floor: Option<Duration>,
    /// Pause schedule after failures.
    pub backoff: BackoffPolicy,
}

/// Dispatch loop of one registered task.
pub(crate) struct TaskActor {
    id: TaskId,
    name: Arc<str>,
    task: TaskRef,
    slot: Arc<ModeSlot>,
    runtime: CancellationToken,
    bus: Bus,
    params: TaskActorParams,
}

impl TaskActor {
    pub(crate) fn new(
        id: TaskId,
        name: Arc<str>,
        task: TaskRef,
        slot: Arc<ModeSlot>,
        runtime: CancellationToken,
        bus: Bus,
        params: TaskActorParams,
    ) -> Self {
        Self {
            id,
            name,
            task,
            slot,
            runtime,
            bus,
            params,
        }
    }

    /// Runs until the runtime token is cancelled.
    pub(crate) async fn run(mut self) {
        let mut last: Option<Mode> = None;
        let mut failures: u32 = 0;

        while !self.runtime.is_cancelled() {
            let (mode, interrupt) = self.slot.acknowledge();
            if last != Some(mode) {
                failures = 0;
                self.publish_entered(mode, last);
                last = Some(mode);
            }

            let ctx = TaskContext::new(
                self.id,
                Arc::clone(&self.name),
                mode,
                interrupt,
                self.params.idle_pause,
            );

            match run_handler(self.task.as_mut(), &ctx, self.params.handler_floor, &self.bus).await {
                HandlerOutcome::Completed => failures = 0,
                HandlerOutcome::Cancelled => {}
                HandlerOutcome::Failed(err) => {
                    let delay = self.params.backoff.next(failures);
                    failures = failures.saturating_add(1);
                    self.bus.publish(
                        Event::new(EventKind::BackoffScheduled)
                            .with_task(Arc::clone(&self.name))
                            .with_task_id(self.id)
                            .with_mode(mode)
                            .with_delay(delay)
                            .with_attempt(failures)
                            .with_reason(err.to_string()),
                    );
                    let _ = ctx.sleep(delay).await;
                }
            }

            if ctx.is_interrupted() {
                failures = 0;
            }
            // handlers that never await must not monopolize the worker thread
            tokio::task::yield_now().await;
        }

        self.bus.publish(
            Event::new(EventKind::TaskStopped)
                .with_task(Arc::clone(&self.name))
                .with_task_id(self.id),
        );
    }

    fn publish_entered(&self, mode: Mode, prev: Option<Mode>) {
        let mut ev = Event::new(EventKind::ModeEntered)
            .with_task(Arc::clone(&self.name))
            .with_task_id(self.id)
            .with_mode(mode);
        if let Some(prev) = prev {
            ev = ev.with_prev_mode(prev);
        }
        self.bus.publish(ev);
    }
}
