//! Error types used by the modevisor runtime, tasks and the shared registry.
//!
//! This module defines three enums:
//!
//! - [`RuntimeError`]: errors raised by the supervisor itself.
//! - [`TaskError`]: outcomes of handler bodies and cooperative checkpoints.
//! - [`RegistryError`]: rejected registry mutations.
//!
//! All of them provide `as_label` (stable snake_case label for logs/events).

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

use crate::shared::IdentityKey;

/// # Errors produced by the supervisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some dispatch loops were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the tasks that did not stop in time.
        stuck: Vec<String>,
    },

    /// The supervisor is shutting down and accepts no new tasks.
    #[error("supervisor is shutting down")]
    ShuttingDown,

    /// OS signal handlers could not be installed.
    #[error("failed to listen for shutdown signals: {0}")]
    Signal(#[from] std::io::Error),

    /// A task was added outside of a Tokio runtime.
    #[error("no tokio runtime available to spawn task {task:?}")]
    NoRuntime {
        /// Name of the rejected task.
        task: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use modevisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::ShuttingDown => "runtime_shutting_down",
            RuntimeError::Signal(_) => "runtime_signal_unavailable",
            RuntimeError::NoRuntime { .. } => "runtime_missing",
        }
    }
}

/// # Outcomes of handler bodies and checkpoints.
///
/// [`TaskError::Interrupted`] is not a failure: it is the cancellation signal a
/// handler propagates (usually with `?`) after a mode change, so the dispatch
/// loop can re-read the mode. Every other variant is reported as a handler
/// failure and followed by a backoff pause.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The task's mode changed (or the supervisor is shutting down).
    #[error("interrupted by mode change")]
    Interrupted,

    /// The calling task tried to borrow a resource it already holds.
    #[error("resource {key} is already held by this task")]
    Reentrant {
        /// Key of the resource.
        key: IdentityKey,
    },

    /// Handler failed; the task keeps running after a backoff pause.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Handler panicked; the panic was contained by the dispatch loop.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Wraps a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        TaskError::Panicked {
            info: panic_message(&*payload),
        }
    }

    /// True for the cancellation signal.
    #[inline]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, TaskError::Interrupted)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use modevisor::TaskError;
    ///
    /// assert_eq!(TaskError::Interrupted.as_label(), "task_interrupted");
    /// assert_eq!(TaskError::fail("no pressure").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Interrupted => "task_interrupted",
            TaskError::Reentrant { .. } => "task_reentrant_borrow",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }
}

/// # Rejected registry mutations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The key already names a resource; keys are never rebound.
    #[error("{key} is already registered")]
    AlreadyRegistered {
        /// Offending key.
        key: IdentityKey,
    },

    /// The key names no resource.
    #[error("{key} is not registered")]
    NotRegistered {
        /// Offending key.
        key: IdentityKey,
    },

    /// The resource is currently borrowed and cannot be replaced.
    #[error("{key} is borrowed; replace requires a quiescent resource")]
    Busy {
        /// Offending key.
        key: IdentityKey,
    },

    /// The registry was sealed after startup.
    #[error("registry is sealed; cannot register {key}")]
    Sealed {
        /// Offending key.
        key: IdentityKey,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::AlreadyRegistered { .. } => "registry_already_registered",
            RegistryError::NotRegistered { .. } => "registry_not_registered",
            RegistryError::Busy { .. } => "registry_busy",
            RegistryError::Sealed { .. } => "registry_sealed",
        }
    }

    /// Key the rejected operation named.
    pub fn key(&self) -> IdentityKey {
        match self {
            RegistryError::AlreadyRegistered { key }
            | RegistryError::NotRegistered { key }
            | RegistryError::Busy { key }
            | RegistryError::Sealed { key } => *key,
        }
    }
}

/// Renders a panic payload (`&str` or `String` messages, anything else as "unknown panic").
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
