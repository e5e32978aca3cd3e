//! # Task registry: the supervisor's authoritative mode and task list.
//!
//! Both live under **one** lock, so registering a task and broadcasting a
//! mode never interleave:
//!
//! ```text
//! insert(task)        lock ─► check closed ─► slot = ModeSlot(mode) ─► spawn loop ─► push   unlock
//! broadcast(m)        lock ─► mode = m ─► for entry in order: slot.assign(m)              unlock
//! close()             lock ─► closed = true ─► take join handles                         unlock
//! ```
//!
//! A task inserted concurrently with a broadcast therefore either starts in
//! the new mode or is interrupted by it; it never misses it.
//!
//! Events published here (`ModeChanged`, `TaskInterrupted`, `TaskAdded`) are
//! sent while the lock is held, so they precede anything the affected
//! dispatch loops publish in response.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    core::slot::ModeSlot,
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    mode::Mode,
    tasks::TaskId,
};

/// Snapshot of one registered task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskInfo {
    /// Id assigned at registration.
    pub id: TaskId,
    /// Task name.
    pub name: Arc<str>,
    /// Mode currently assigned to the task.
    pub mode: Mode,
}

struct Entry {
    id: TaskId,
    name: Arc<str>,
    slot: Arc<ModeSlot>,
    join: Option<JoinHandle<()>>,
}

struct Table {
    mode: Mode,
    closed: bool,
    entries: Vec<Entry>,
}

/// Ordered list of registered tasks plus the global mode.
pub(crate) struct Registry {
    table: Mutex<Table>,
    bus: Bus,
    runtime: CancellationToken,
}

impl Registry {
    pub(crate) fn new(mode: Mode, bus: Bus, runtime: CancellationToken) -> Self {
        Self {
            table: Mutex::new(Table {
                mode,
                closed: false,
                entries: Vec::new(),
            }),
            bus,
            runtime,
        }
    }

    /// Registers a task in the current mode and spawns its loop via `spawn`.
    pub(crate) fn insert<F>(&self, name: Arc<str>, spawn: F) -> Result<TaskId, RuntimeError>
    where
        F: FnOnce(TaskId, Arc<ModeSlot>) -> JoinHandle<()>,
    {
        let mut table = self.table.lock();
        if table.closed {
            return Err(RuntimeError::ShuttingDown);
        }

        let id = TaskId::next();
        let mode = table.mode;
        let slot = Arc::new(ModeSlot::new(mode, &self.runtime));
        self.bus.publish(
            Event::new(EventKind::TaskAdded)
                .with_task(Arc::clone(&name))
                .with_task_id(id)
                .with_mode(mode),
        );
        let join = spawn(id, Arc::clone(&slot));
        table.entries.push(Entry {
            id,
            name,
            slot,
            join: Some(join),
        });
        Ok(id)
    }

    /// Assigns `mode` globally and to every task in registration order.
    ///
    /// Returns the previous mode, or `None` when `mode` was already current.
    pub(crate) fn broadcast(&self, mode: Mode) -> Option<Mode> {
        let mut table = self.table.lock();
        if table.mode == mode {
            return None;
        }
        let prev = std::mem::replace(&mut table.mode, mode);
        self.bus.publish(
            Event::new(EventKind::ModeChanged)
                .with_mode(mode)
                .with_prev_mode(prev),
        );

        for entry in &table.entries {
            if let Some(was) = entry.slot.assign(mode) {
                self.bus.publish(
                    Event::new(EventKind::TaskInterrupted)
                        .with_task(Arc::clone(&entry.name))
                        .with_task_id(entry.id)
                        .with_mode(mode)
                        .with_prev_mode(was),
                );
            }
        }
        Some(prev)
    }

    pub(crate) fn mode(&self) -> Mode {
        self.table.lock().mode
    }

    pub(crate) fn snapshot(&self) -> Vec<TaskInfo> {
        self.table
            .lock()
            .entries
            .iter()
            .map(|e| TaskInfo {
                id: e.id,
                name: Arc::clone(&e.name),
                mode: e.slot.mode(),
            })
            .collect()
    }

    /// Refuses further inserts and hands out the join handles.
    ///
    /// Returns `None` when the registry was already closed.
    pub(crate) fn close(&self) -> Option<Vec<(Arc<str>, JoinHandle<()>)>> {
        let mut table = self.table.lock();
        if table.closed {
            return None;
        }
        table.closed = true;
        Some(
            table
                .entries
                .iter_mut()
                .filter_map(|e| e.join.take().map(|j| (Arc::clone(&e.name), j)))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (Registry, tokio::sync::broadcast::Receiver<Event>) {
        let bus = Bus::new(64);
        let rx = bus.subscribe();
        (Registry::new(Mode::Disabled, bus, CancellationToken::new()), rx)
    }

    #[tokio::test]
    async fn insert_uses_current_mode_and_broadcast_reaches_all() {
        let (reg, mut rx) = registry();
        let mut slots = Vec::new();
        for name in ["a", "b"] {
            reg.insert(Arc::from(name), |_, slot| {
                slots.push(slot);
                tokio::spawn(async {})
            })
            .unwrap();
        }
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::TaskAdded);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::TaskAdded);

        assert_eq!(reg.broadcast(Mode::Autonomous), Some(Mode::Disabled));
        assert!(slots.iter().all(|s| s.mode() == Mode::Autonomous));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ModeChanged);
        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::TaskInterrupted);
        assert_eq!(first.task.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.unwrap().task.as_deref(), Some("b"));

        assert_eq!(reg.broadcast(Mode::Autonomous), None);
        assert!(rx.try_recv().is_err());

        let info = reg.snapshot();
        assert_eq!(info.len(), 2);
        assert!(info.iter().all(|t| t.mode == Mode::Autonomous));
    }

    #[tokio::test]
    async fn closed_registry_rejects_inserts() {
        let (reg, _rx) = registry();
        reg.insert(Arc::from("a"), |_, _| tokio::spawn(async {}))
            .unwrap();
        let joins = reg.close().unwrap();
        assert_eq!(joins.len(), 1);
        assert!(reg.close().is_none());

        let err = reg
            .insert(Arc::from("late"), |_, _| tokio::spawn(async {}))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ShuttingDown));
    }
}
