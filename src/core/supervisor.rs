//! # Supervisor: registers tasks, broadcasts modes, and shuts down gracefully.
//!
//! The [`Supervisor`] owns the event bus, a [`SubscriberSet`], the task
//! registry (global mode plus ordered task list) and the runtime token every
//! interrupt token descends from.
//!
//! ## High-level architecture
//! ```text
//! Startup:
//!   Supervisor::builder(cfg).with_subscribers(subs).build()
//!       └─► subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!
//! Registration:
//!   add_task(task) ─► Registry::insert ─► ModeSlot(current mode) ─► spawn TaskActor::run()
//!
//! Mode change (driver, synchronous):
//!   broadcast(m) ─► Registry::broadcast
//!                      ├─► mode = m                              (ModeChanged)
//!                      └─► for each task: slot.assign(m)         (TaskInterrupted)
//!                               └─► interrupt token cancelled ─► handler checkpoint ─► Err(Interrupted)
//!                                                                 └─► loop re-reads mode ─► new handler
//!
//! Shutdown path:
//!   shutdown() / run_until_signal()
//!       └─► Bus.publish(ShutdownRequested)
//!       └─► runtime_token.cancel()   → propagates to every interrupt token
//!       └─► wait_all_with_grace(cfg.grace):
//!              ├─ Ok (all joined)    → Bus.publish(AllStoppedWithin)
//!              └─ Timeout exceeded   → Bus.publish(GraceExceeded) + RuntimeError::GraceExceeded
//!       └─► listener forwards the final event and ends
//!       └─► SubscriberSet::shutdown() drains every subscriber queue
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use modevisor::{Config, Mode, Supervisor, TaskContext, TaskFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.grace = Duration::from_secs(1);
//!
//!     let sup = Supervisor::builder(cfg).build();
//!     sup.add_task(TaskFn::new("drive").on_teleop(|ctx: TaskContext| async move {
//!         // read joystick, command motors...
//!         ctx.sleep(Duration::from_millis(20)).await
//!     }))?;
//!
//!     sup.broadcast(Mode::Teleoperated);
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     sup.broadcast(Mode::Disabled);
//!
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{
    actor::{TaskActor, TaskActorParams},
    builder::SupervisorBuilder,
    registry::{Registry, TaskInfo},
    shutdown,
};
use crate::{
    core::Config,
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    mode::Mode,
    subscribers::SubscriberSet,
    tasks::{Task, TaskId, TaskRef},
};

/// Coordinates mode broadcasts, task dispatch loops, event delivery (via
/// [`SubscriberSet`]) and graceful shutdown.
///
/// Dropping the last handle cancels the runtime token, which stops every
/// dispatch loop at its next checkpoint.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    registry: Registry,
    runtime_token: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        registry: Registry,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            registry,
            runtime_token,
            listener: Mutex::new(None),
        }
    }

    /// Creates a builder for constructing a supervisor.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    /// Registers `task`, assigns it the current mode and spawns its dispatch loop.
    ///
    /// Publishes `TaskAdded`. Boxed tasks ([`TaskRef`]) are accepted as well.
    ///
    /// # Errors
    /// - [`RuntimeError::ShuttingDown`] once shutdown has begun
    /// - [`RuntimeError::NoRuntime`] outside a Tokio runtime
    pub fn add_task<T: Task>(&self, task: T) -> Result<TaskId, RuntimeError> {
        let name: Arc<str> = Arc::from(task.name());
        let handle = Handle::try_current().map_err(|_| RuntimeError::NoRuntime {
            task: name.to_string(),
        })?;
        if self.runtime_token.is_cancelled() {
            return Err(RuntimeError::ShuttingDown);
        }

        let task: TaskRef = Box::new(task);
        let runtime = self.runtime_token.clone();
        let bus = self.bus.clone();
        let params = self.actor_params();

        self.registry.insert(Arc::clone(&name), move |id, slot| {
            let actor = TaskActor::new(id, name, task, slot, runtime, bus, params);
            handle.spawn(actor.run())
        })
    }

    /// Sets the global mode and notifies every task, in registration order.
    ///
    /// Synchronous: when it returns, every task's slot holds `mode`, and each
    /// task whose previous mode differed has had its interrupt token
    /// cancelled. Broadcasting the current mode is a no-op (no interrupts,
    /// no `ModeChanged`).
    pub fn broadcast(&self, mode: Mode) {
        if let Some(prev) = self.registry.broadcast(mode) {
            tracing::debug!(from = %prev, to = %mode, "mode broadcast");
        }
    }

    /// Current global mode.
    pub fn mode(&self) -> Mode {
        self.registry.mode()
    }

    /// Snapshot of registered tasks, in registration order.
    pub fn tasks(&self) -> Vec<TaskInfo> {
        self.registry.snapshot()
    }

    /// Raw receiver of runtime events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Configuration this supervisor was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Stops every dispatch loop and waits up to [`Config::grace`].
    ///
    /// Before returning, subscribers have processed every event up to and
    /// including the final `AllStoppedWithin` / `GraceExceeded`.
    /// Later calls return `Ok(())` immediately. After shutdown begins,
    /// [`add_task`](Self::add_task) fails with [`RuntimeError::ShuttingDown`].
    ///
    /// # Errors
    /// [`RuntimeError::GraceExceeded`] listing the tasks still running when
    /// the grace period ran out. Their loops are left to finish on their own.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let Some(joins) = self.registry.close() else {
            return Ok(());
        };
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();
        let res = self.wait_all_with_grace(joins).await;
        self.drain_subscribers().await;
        res
    }

    /// Waits for SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then shuts down.
    ///
    /// # Errors
    /// [`RuntimeError::Signal`] if signal handlers cannot be installed (no
    /// shutdown happens), otherwise whatever [`shutdown`](Self::shutdown) returns.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        shutdown::wait_for_shutdown_signal().await?;
        self.shutdown().await
    }

    /// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
    ///
    /// The listener ends with the final shutdown event.
    pub(crate) fn subscriber_listener(&self) {
        if self.subs.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        set.emit(&ev);
                        if matches!(ev.kind, EventKind::AllStoppedWithin | EventKind::GraceExceeded) {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event listener lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *self.listener.lock() = Some(handle);
    }

    /// Waits for the listener to forward the final event, then for every
    /// subscriber queue to empty.
    async fn drain_subscribers(&self) {
        let listener = self.listener.lock().take();
        if let Some(handle) = listener {
            let _ = handle.await;
        }
        self.subs.shutdown().await;
    }

    fn actor_params(&self) -> TaskActorParams {
        TaskActorParams {
            idle_pause: self.cfg.idle_pause,
            handler_floor: self.cfg.handler_floor(),
            backoff: self.cfg.backoff,
        }
    }

    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] on timeout and returns
    /// [`RuntimeError::GraceExceeded`] with the list of stuck tasks.
    async fn wait_all_with_grace(
        &self,
        mut joins: Vec<(Arc<str>, JoinHandle<()>)>,
    ) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        let done = async {
            for (_, join) in joins.iter_mut() {
                let _ = join.await;
            }
        };

        let timed = tokio::time::timeout(grace, done).await;
        match timed {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck: Vec<String> = joins
                    .iter()
                    .filter(|(_, join)| !join.is_finished())
                    .map(|(name, _)| name.to_string())
                    .collect();
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")));
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.runtime_token.cancel();
    }
}
