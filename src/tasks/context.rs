//! # Per-invocation task context and cooperative checkpoints.
//!
//! Every handler invocation receives a [`TaskContext`]. It carries the mode the
//! dispatch loop read at loop entry and the interrupt token the supervisor
//! cancels when that mode becomes stale.
//!
//! ## Checkpoints
//! ```text
//! ctx.check_interrupt()?          explicit check, never waits
//! ctx.sleep(d).await?             timed pause, aborts on interrupt
//! ctx.idle().await?               short pause of Config::idle_pause
//! ctx.interruptible(fut).await?   any future raced against the interrupt
//! registry.borrow(key, &ctx)      resource wait, aborts on interrupt
//! ```
//! Each returns `Err(TaskError::Interrupted)` once the token is cancelled; the
//! handler propagates it (after any cleanup) and the loop re-checks the mode.
//!
//! A handler that never reaches a checkpoint will not react to mode changes.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use tokio::time;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::core::DEFAULT_IDLE_PAUSE;
use crate::error::TaskError;
use crate::mode::Mode;

/// Source of task ids. Zero means "no task" for lock holder tracking.
static TASK_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique id of a registered task.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(TASK_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    pub(crate) fn from_raw(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    /// Raw id, for logs and events.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Execution context handed to handlers.
///
/// Cheap to clone; clones observe the same interrupt token.
#[derive(Clone)]
pub struct TaskContext {
    id: TaskId,
    name: Arc<str>,
    mode: Mode,
    interrupt: CancellationToken,
    idle_pause: Duration,
}

impl TaskContext {
    pub(crate) fn new(
        id: TaskId,
        name: Arc<str>,
        mode: Mode,
        interrupt: CancellationToken,
        idle_pause: Duration,
    ) -> Self {
        Self {
            id,
            name,
            mode,
            interrupt,
            idle_pause,
        }
    }

    /// Context for code running outside a supervised task (startup wiring,
    /// tests). It has its own id and is never interrupted unless `token` is
    /// cancelled by the caller.
    pub fn detached(name: impl Into<Arc<str>>, mode: Mode, token: CancellationToken) -> Self {
        Self::new(
            TaskId::next(),
            name.into(),
            mode,
            token,
            DEFAULT_IDLE_PAUSE,
        )
    }

    /// Id of the task this context belongs to.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Task name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mode this invocation was dispatched for.
    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// True once the mode changed (or shutdown began) since dispatch.
    #[inline]
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_cancelled()
    }

    /// Explicit checkpoint.
    ///
    /// ```rust,ignore
    /// for step in plan {
    ///     if let Err(e) = ctx.check_interrupt() {
    ///         arm.stop();
    ///         return Err(e);
    ///     }
    ///     step.run();
    /// }
    /// ```
    #[inline]
    pub fn check_interrupt(&self) -> Result<(), TaskError> {
        if self.interrupt.is_cancelled() {
            Err(TaskError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleeps for `dur`, aborting early on interrupt.
    pub async fn sleep(&self, dur: Duration) -> Result<(), TaskError> {
        self.interruptible(time::sleep(dur)).await
    }

    /// Default pacing pause used by handlers that were not overridden.
    pub async fn idle(&self) -> Result<(), TaskError> {
        self.sleep(self.idle_pause).await
    }

    /// Races `fut` against the interrupt token.
    ///
    /// Returns `Err(TaskError::Interrupted)` without polling `fut` when the
    /// token is already cancelled. `fut` is dropped on interrupt.
    pub async fn interruptible<F: Future>(&self, fut: F) -> Result<F::Output, TaskError> {
        if self.interrupt.is_cancelled() {
            return Err(TaskError::Interrupted);
        }
        tokio::select! {
            biased;
            _ = self.interrupt.cancelled() => Err(TaskError::Interrupted),
            out = fut => Ok(out),
        }
    }

    /// Future that completes when this context is interrupted.
    pub fn interrupted(&self) -> WaitForCancellationFuture<'_> {
        self.interrupt.cancelled()
    }

    /// The underlying token, for integrating with other cancellable APIs.
    pub fn token(&self) -> &CancellationToken {
        &self.interrupt
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}
