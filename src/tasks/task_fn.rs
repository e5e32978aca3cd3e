//! # Closure-backed task (`TaskFn`)
//!
//! [`TaskFn`] assembles a [`Task`] from up to three closures, one per mode.
//! Each closure is `FnMut(TaskContext) -> Fut` and produces a fresh future per
//! invocation; state that must survive between invocations lives in the
//! closure's captures (or in an `Arc<...>` shared with other tasks).
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use modevisor::{Task, TaskContext, TaskFn};
//!
//! let t = TaskFn::new("status").on_teleop(|ctx: TaskContext| async move {
//!     println!("teleop tick in {}", ctx.mode());
//!     ctx.sleep(Duration::from_secs(2)).await
//! });
//!
//! assert_eq!(t.name(), "status");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::TaskError;
use crate::tasks::{Task, TaskContext, TaskRef};

type Handler = Box<dyn FnMut(TaskContext) -> BoxFuture<'static, Result<(), TaskError>> + Send>;

/// Function-backed task implementation.
pub struct TaskFn {
    name: Cow<'static, str>,
    disabled: Option<Handler>,
    autonomous: Option<Handler>,
    teleop: Option<Handler>,
}

fn boxed<F, Fut>(mut f: F) -> Handler
where
    F: FnMut(TaskContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    Box::new(move |ctx| f(ctx).boxed())
}

impl TaskFn {
    /// Creates a task whose handlers all idle until overridden.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            disabled: None,
            autonomous: None,
            teleop: None,
        }
    }

    /// Sets the disabled-mode handler.
    pub fn on_disabled<F, Fut>(mut self, f: F) -> Self
    where
        F: FnMut(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.disabled = Some(boxed(f));
        self
    }

    /// Sets the autonomous-mode handler.
    pub fn on_autonomous<F, Fut>(mut self, f: F) -> Self
    where
        F: FnMut(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.autonomous = Some(boxed(f));
        self
    }

    /// Sets the teleop-mode handler.
    pub fn on_teleop<F, Fut>(mut self, f: F) -> Self
    where
        F: FnMut(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.teleop = Some(boxed(f));
        self
    }

    /// Boxes the task for [`Supervisor::add_task`](crate::Supervisor::add_task).
    pub fn boxed(self) -> TaskRef {
        Box::new(self)
    }
}

async fn call(handler: &mut Option<Handler>, ctx: &TaskContext) -> Result<(), TaskError> {
    match handler {
        Some(f) => f(ctx.clone()).await,
        None => ctx.idle().await,
    }
}

#[async_trait]
impl Task for TaskFn {
    fn name(&self) -> &str {
        &self.name
    }

    async fn disabled(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        call(&mut self.disabled, ctx).await
    }

    async fn autonomous(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        call(&mut self.autonomous, ctx).await
    }

    async fn teleop(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        call(&mut self.teleop, ctx).await
    }
}

impl fmt::Debug for TaskFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFn")
            .field("name", &self.name)
            .field("disabled", &self.disabled.is_some())
            .field("autonomous", &self.autonomous.is_some())
            .field("teleop", &self.teleop.is_some())
            .finish()
    }
}
