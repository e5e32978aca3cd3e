//! # Mode-aware task abstraction.
//!
//! A [`Task`] provides one handler per [`Mode`](crate::Mode). The supervisor's
//! dispatch loop calls the handler matching the task's current mode, over and
//! over, until shutdown. Handlers pace themselves through the checkpoints on
//! [`TaskContext`]; the ones left unimplemented default to
//! [`TaskContext::idle`].

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::TaskContext;

/// Boxed task, as stored by the supervisor. Boxes are tasks themselves.
pub type TaskRef = Box<dyn Task>;

/// # Long-lived unit of repeated, mode-dependent work.
///
/// Each handler runs once per loop iteration while the task is in the
/// matching mode. Return `Err(TaskError::Interrupted)` (usually via `?` on a
/// checkpoint) to abandon the current invocation after a mode change.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use async_trait::async_trait;
/// use modevisor::{Task, TaskContext, TaskError};
///
/// struct Blinker {
///     on: bool,
/// }
///
/// #[async_trait]
/// impl Task for Blinker {
///     fn name(&self) -> &str { "blinker" }
///
///     async fn teleop(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
///         self.on = !self.on;
///         ctx.sleep(Duration::from_millis(500)).await
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Called repeatedly while the system is disabled.
    async fn disabled(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        ctx.idle().await
    }

    /// Called repeatedly during the autonomous phase.
    async fn autonomous(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        ctx.idle().await
    }

    /// Called repeatedly during the teleoperated phase.
    async fn teleop(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        ctx.idle().await
    }
}

#[async_trait]
impl<T: Task + ?Sized> Task for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn disabled(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        (**self).disabled(ctx).await
    }

    async fn autonomous(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        (**self).autonomous(ctx).await
    }

    async fn teleop(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        (**self).teleop(ctx).await
    }
}
