//! Runtime core: orchestration and lifecycle.
//!
//! The public API from this module is [`Supervisor`] (with its builder),
//! [`Config`], [`TaskInfo`] and [`HandlerOutcome`].
//!
//! Internal modules:
//! - [`slot`]: per-task mode + interrupt token, edge-triggered acknowledgement;
//! - [`registry`]: global mode and ordered task list under one lock;
//! - [`runner`]: runs one handler invocation with panic containment and event publishing;
//! - [`actor`]: the per-task dispatch loop with failure backoff;
//! - [`supervisor`]: registration, broadcast, graceful shutdown;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod actor;
mod builder;
mod config;
mod registry;
mod runner;
mod shutdown;
mod slot;
mod supervisor;

pub(crate) use config::DEFAULT_IDLE_PAUSE;

pub use builder::SupervisorBuilder;
pub use config::Config;
pub use registry::TaskInfo;
pub use runner::HandlerOutcome;
pub use supervisor::Supervisor;
