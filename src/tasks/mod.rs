//! # Task abstractions.
//!
//! This module provides the task-related types:
//! - [`Task`] - trait with one async handler per mode
//! - [`TaskFn`] - closure-backed task implementation
//! - [`TaskRef`] - boxed task (`Box<dyn Task>`)
//! - [`TaskContext`], [`TaskId`] - per-invocation context with cooperative checkpoints

mod context;
mod task;
mod task_fn;

pub use context::{TaskContext, TaskId};
pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;
