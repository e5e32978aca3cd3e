//! # Fair exclusive lock around one shared value.
//!
//! [`ResourceLock`] pairs a value with a FIFO-fair async mutex. Borrowing
//! yields a [`ResourceGuard`]; dropping the guard (or calling
//! [`ResourceGuard::release`]) hands the lock to the next waiter.
//!
//! ## Fairness
//! Waiters queue on a [`tokio::sync::Mutex`], which grants the lock in the
//! order `lock` was called. A waiter that is interrupted leaves the queue
//! without ever being granted, so a cancelled wait never leaves the lock
//! half-acquired.
//!
//! ```text
//! holder ─ release ─► waiter#1 ─ release ─► waiter#2 ─ ...
//!                        ▲
//!          waiter#k interrupted ─► removed from queue, gets Err(Interrupted)
//! ```
//!
//! ## Rules
//! - At most one unreleased guard exists per lock.
//! - Borrowing a lock the calling task already holds is rejected with
//!   [`TaskError::Reentrant`] instead of deadlocking.
//! - No ordering across different locks: take multiple keys in a fixed order.

use std::any::Any;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::TaskError;
use crate::shared::IdentityKey;
use crate::tasks::{TaskContext, TaskId};

/// Type-erased resource value for heterogeneous registries.
pub type AnyResource = Box<dyn Any + Send>;

/// Lock bookkeeping shared with outstanding guards.
#[derive(Default)]
struct LockState {
    /// Raw [`TaskId`] of the current holder (0 = free).
    holder: AtomicU64,
    /// Number of borrowers currently queued.
    waiters: AtomicUsize,
}

/// Fair mutual-exclusion wrapper around one shared value.
pub struct ResourceLock<T> {
    key: IdentityKey,
    value: Arc<Mutex<T>>,
    state: Arc<LockState>,
}

impl<T: Send + 'static> ResourceLock<T> {
    /// Wraps `value`; the lock starts free.
    pub fn new(key: IdentityKey, value: T) -> Self {
        Self {
            key,
            value: Arc::new(Mutex::new(value)),
            state: Arc::new(LockState::default()),
        }
    }

    /// Key this lock was registered under.
    #[inline]
    pub fn key(&self) -> IdentityKey {
        self.key
    }

    /// Waits for exclusive access and returns a guard to the value.
    ///
    /// This is a cooperative checkpoint: it returns [`TaskError::Interrupted`]
    /// if `ctx` is interrupted before or while waiting.
    pub async fn acquire_and_borrow(&self, ctx: &TaskContext) -> Result<ResourceGuard<T>, TaskError> {
        ctx.check_interrupt()?;
        if self.holder() == Some(ctx.id()) {
            tracing::error!(key = %self.key, task = %ctx.name(), "reentrant borrow rejected");
            return Err(TaskError::Reentrant { key: self.key });
        }

        let _queued = QueuedWaiter::enter(&self.state);
        let guard = ctx.interruptible(Arc::clone(&self.value).lock_owned()).await?;
        Ok(self.grant(guard, ctx.id()))
    }

    /// Takes the lock only if it is free right now.
    pub fn try_acquire(&self, ctx: &TaskContext) -> Option<ResourceGuard<T>> {
        let guard = Arc::clone(&self.value).try_lock_owned().ok()?;
        Some(self.grant(guard, ctx.id()))
    }

    /// True while a guard is outstanding.
    pub fn is_held(&self) -> bool {
        self.state.holder.load(AtomicOrdering::Acquire) != 0
    }

    /// Task currently holding the lock, if it was taken through a task context.
    pub fn holder(&self) -> Option<TaskId> {
        TaskId::from_raw(self.state.holder.load(AtomicOrdering::Acquire))
    }

    /// Number of borrowers queued behind the holder.
    ///
    /// Approximate: a borrower is counted just before it enters the mutex
    /// queue and uncounted just after it leaves, so the value may briefly
    /// lead the real queue. Use it for diagnostics, not to order arrivals.
    pub fn waiters(&self) -> usize {
        self.state.waiters.load(AtomicOrdering::Acquire)
    }

    /// Swaps the wrapped value when nobody holds the lock.
    pub(crate) fn swap_if_idle(&self, value: T) -> Result<T, T> {
        match self.value.try_lock() {
            Ok(mut guard) => Ok(std::mem::replace(&mut *guard, value)),
            Err(_) => Err(value),
        }
    }

    fn grant(&self, guard: OwnedMutexGuard<T>, holder: TaskId) -> ResourceGuard<T> {
        self.state
            .holder
            .store(holder.as_u64(), AtomicOrdering::Release);
        ResourceGuard {
            key: self.key,
            state: Arc::clone(&self.state),
            guard,
        }
    }
}

impl<T> fmt::Debug for ResourceLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLock")
            .field("key", &self.key)
            .field("waiters", &self.state.waiters.load(AtomicOrdering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Counts a borrower as queued for as long as it waits.
struct QueuedWaiter<'a>(&'a LockState);

impl<'a> QueuedWaiter<'a> {
    fn enter(state: &'a LockState) -> Self {
        state.waiters.fetch_add(1, AtomicOrdering::AcqRel);
        Self(state)
    }
}

impl Drop for QueuedWaiter<'_> {
    fn drop(&mut self) {
        self.0.waiters.fetch_sub(1, AtomicOrdering::AcqRel);
    }
}

/// Exclusive borrow of a registered value.
///
/// Dereferences to the value. The lock is released when the guard is dropped.
#[must_use = "dropping the guard releases the resource immediately"]
pub struct ResourceGuard<T> {
    key: IdentityKey,
    state: Arc<LockState>,
    guard: OwnedMutexGuard<T>,
}

impl<T> ResourceGuard<T> {
    /// Key of the borrowed resource.
    #[inline]
    pub fn key(&self) -> IdentityKey {
        self.key
    }

    /// Releases the resource. Equivalent to dropping the guard.
    pub fn release(self) {
        drop(self);
    }
}

impl ResourceGuard<AnyResource> {
    /// Views the type-erased value as `U`.
    pub fn downcast_ref<U: Any>(&self) -> Option<&U> {
        (**self.guard).downcast_ref::<U>()
    }

    /// Mutable view of the type-erased value as `U`.
    pub fn downcast_mut<U: Any>(&mut self) -> Option<&mut U> {
        (**self.guard).downcast_mut::<U>()
    }
}

impl<T> Deref for ResourceGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for ResourceGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for ResourceGuard<T> {
    fn drop(&mut self) {
        // Cleared before the mutex guard field is dropped and the next waiter runs.
        self.state.holder.store(0, AtomicOrdering::Release);
    }
}

impl<T: fmt::Debug> fmt::Debug for ResourceGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("key", &self.key)
            .field("value", &*self.guard)
            .finish()
    }
}
