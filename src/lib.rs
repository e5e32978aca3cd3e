//! # modevisor
//!
//! **Modevisor** coordinates the long-lived workers of a periodically driven
//! control application (a robot controller) across a global operating mode:
//! `Disabled → Autonomous → Teleoperated`.
//!
//! It provides two building blocks:
//! - a mode-broadcasting [`Supervisor`] that runs every registered [`Task`]
//!   in its own dispatch loop and, on [`Supervisor::broadcast`], interrupts the
//!   tasks whose mode changed so they re-enter the matching handler promptly;
//! - a fair, identity-keyed [`SharedRegistry`] through which tasks borrow
//!   exclusive access to shared stateful objects (motors, sensors), granted
//!   first-come-first-served.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!              driver (outer periodic shell)
//!                          │ broadcast(mode)
//!                          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - Registry (global mode + ordered task list, one lock)           │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        │ slot.assign      │                  │
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  TaskActor   │   │  TaskActor   │   │  TaskActor   │
//!     │ (dispatch    │   │ (dispatch    │   │ (dispatch    │
//!     │  loop)       │   │  loop)       │   │  loop)       │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ borrow(key, &ctx) / drop(guard)     │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  SharedRegistry: IdentityKey → ResourceLock (FIFO, exclusive)     │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle of one task
//! ```text
//! add_task(task) ──► Registry ──► TaskActor::run()
//!
//! loop {
//!   ├─► (mode, interrupt) = slot.acknowledge()     edge-triggered
//!   ├─► ctx = TaskContext { mode, interrupt, .. }
//!   ├─► match mode { Disabled ⇒ disabled(ctx), Autonomous ⇒ autonomous(ctx), Teleoperated ⇒ teleop(ctx) }
//!   │       ├─ Ok            ─► (HandlerTooFast if under Config::min_handler_time)
//!   │       ├─ Interrupted   ─► re-read mode immediately
//!   │       └─ Err / panic   ─► HandlerFailed, BackoffScheduled, cancellable pause
//!   └─ exit: shutdown (runtime token cancelled)
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------------|---------------------------------------------|
//! | **Modes**         | Closed set of operating modes.                                  | [`Mode`]                                    |
//! | **Tasks**         | One async handler per mode, cooperative checkpoints.            | [`Task`], [`TaskFn`], [`TaskContext`]       |
//! | **Supervision**   | Registration, synchronous broadcast, graceful shutdown.         | [`Supervisor`], [`Config`]                  |
//! | **Shared state**  | Fair exclusive borrows by opaque key.                           | [`SharedRegistry`], [`IdentityKey`]         |
//! | **Policies**      | Backoff after failing handlers.                                 | [`BackoffPolicy`], [`JitterPolicy`]         |
//! | **Subscriber API**| Hook into runtime events (logging, metrics).                    | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for runtime, handlers and the registry.            | [`RuntimeError`], [`TaskError`], [`RegistryError`] |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] that renders events via `tracing`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use modevisor::{Config, IdentityKey, Mode, SharedRegistry, Supervisor, TaskContext, TaskFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let motor = IdentityKey::new();
//!     let shared: SharedRegistry<f64> = SharedRegistry::new();
//!     shared.register(motor, 0.0)?;
//!     shared.seal();
//!
//!     let sup = Supervisor::builder(Config::default()).build();
//!
//!     let registry = shared.clone();
//!     sup.add_task(TaskFn::new("drive").on_autonomous(move |ctx: TaskContext| {
//!         let registry = registry.clone();
//!         async move {
//!             if let Some(mut output) = registry.borrow(motor, &ctx).await? {
//!                 *output = 0.5;
//!             }
//!             ctx.sleep(Duration::from_millis(20)).await
//!         }
//!     }))?;
//!
//!     sup.broadcast(Mode::Autonomous);
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     sup.broadcast(Mode::Disabled);
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod mode;
mod policies;
mod shared;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{Config, HandlerOutcome, Supervisor, SupervisorBuilder, TaskInfo};
pub use error::{RegistryError, RuntimeError, TaskError};
pub use events::{Event, EventKind};
pub use mode::{Mode, ParseModeError};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use shared::{AnyRegistry, AnyResource, IdentityKey, ResourceGuard, ResourceLock, SharedRegistry};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{Task, TaskContext, TaskFn, TaskId, TaskRef};

// Optional: expose a tracing-backed logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
