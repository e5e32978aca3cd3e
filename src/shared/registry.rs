//! # Keyed registry of shared resources.
//!
//! [`SharedRegistry`] maps [`IdentityKey`]s to [`ResourceLock`]s. Tasks borrow
//! a resource by key, use it, and release it; each key serializes its
//! borrowers in arrival order.
//!
//! ## Lifecycle
//! ```text
//! startup:   let reg = SharedRegistry::new();
//!            reg.register(JOYSTICK, js)?;  reg.register(LEFT, motor)?;
//!            reg.seal();                            (optional)
//! running:   let js = reg.borrow(JOYSTICK, &ctx).await?;   (cooperative checkpoint)
//!            ... use js ...
//!            reg.release(js);                       (or drop)
//! ```
//!
//! ## Rules
//! - A key, once registered, names the same lock for the registry's lifetime.
//! - Registering a key twice is rejected; [`replace`](SharedRegistry::replace)
//!   swaps the value inside the existing lock, and only while nobody holds it.
//! - `borrow` on an unregistered key returns `Ok(None)` without waiting.
//! - `borrow`/`release` touch lock state only, never the key set.
//! - The registry never inspects values.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;

use crate::error::{RegistryError, TaskError};
use crate::shared::{AnyResource, IdentityKey, ResourceGuard, ResourceLock};
use crate::tasks::TaskContext;

/// Registry holding type-erased values of any `Send` type.
pub type AnyRegistry = SharedRegistry<AnyResource>;

struct Inner<T> {
    entries: DashMap<IdentityKey, Arc<ResourceLock<T>>>,
    /// Held shared by `register` for the whole insert, exclusive by `seal`.
    sealed: RwLock<bool>,
}

/// Concurrent `IdentityKey → ResourceLock<T>` table.
///
/// Cloning is cheap: clones share the same table.
pub struct SharedRegistry<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SharedRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> Default for SharedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> SharedRegistry<T> {
    /// Creates an empty, unsealed registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                sealed: RwLock::new(false),
            }),
        }
    }

    /// Wraps `value` in a new lock and binds it to `key`.
    ///
    /// Safe to race with [`seal`](Self::seal): a registration either lands
    /// before the seal takes effect or fails with [`RegistryError::Sealed`].
    pub fn register(&self, key: IdentityKey, value: T) -> Result<(), RegistryError> {
        let sealed = self.inner.sealed.read();
        if *sealed {
            return Err(RegistryError::Sealed { key });
        }
        match self.inner.entries.entry(key) {
            Entry::Occupied(_) => {
                tracing::warn!(%key, "duplicate registration rejected");
                Err(RegistryError::AlreadyRegistered { key })
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(ResourceLock::new(key, value)));
                tracing::debug!(%key, "resource registered");
                Ok(())
            }
        }
    }

    /// Replaces the value behind `key`, returning the previous one.
    ///
    /// Only succeeds while the resource is not borrowed; concurrent borrowers
    /// keep using the same lock and observe the new value afterwards.
    pub fn replace(&self, key: IdentityKey, value: T) -> Result<T, RegistryError> {
        let lock = self.lock(key).ok_or(RegistryError::NotRegistered { key })?;
        match lock.swap_if_idle(value) {
            Ok(previous) => {
                tracing::debug!(%key, "resource replaced");
                Ok(previous)
            }
            Err(_rejected) => Err(RegistryError::Busy { key }),
        }
    }

    /// Borrows the resource behind `key`, waiting for exclusive access.
    ///
    /// - `Ok(None)`: `key` is not registered (returns immediately);
    /// - `Err(TaskError::Interrupted)`: `ctx` was interrupted while waiting;
    /// - `Err(TaskError::Reentrant)`: the calling task already holds `key`.
    pub async fn borrow(
        &self,
        key: IdentityKey,
        ctx: &TaskContext,
    ) -> Result<Option<ResourceGuard<T>>, TaskError> {
        // Clone the lock out so no map shard is held across the wait.
        let Some(lock) = self.lock(key) else {
            return Ok(None);
        };
        lock.acquire_and_borrow(ctx).await.map(Some)
    }

    /// Borrows `key` only if it is registered and free right now.
    pub fn try_borrow(&self, key: IdentityKey, ctx: &TaskContext) -> Option<ResourceGuard<T>> {
        self.lock(key)?.try_acquire(ctx)
    }

    /// Releases a borrowed resource. Equivalent to dropping the guard.
    pub fn release(&self, guard: ResourceGuard<T>) {
        let key = guard.key();
        if !self.contains(key) {
            tracing::debug!(%key, "released guard of unregistered key");
        }
        guard.release();
    }

    /// Lock registered under `key`.
    pub fn lock(&self, key: IdentityKey) -> Option<Arc<ResourceLock<T>>> {
        self.inner.entries.get(&key).map(|e| Arc::clone(e.value()))
    }

    /// True if `key` is registered.
    pub fn contains(&self, key: IdentityKey) -> bool {
        self.inner.entries.contains_key(&key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<IdentityKey> {
        let mut keys: Vec<IdentityKey> = self.inner.entries.iter().map(|e| *e.key()).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Ends the registration phase; later `register` calls fail.
    ///
    /// Waits for registrations already in progress, so the key set is final
    /// once this returns.
    pub fn seal(&self) {
        let mut sealed = self.inner.sealed.write();
        if !*sealed {
            *sealed = true;
            tracing::debug!(resources = self.inner.entries.len(), "registry sealed");
        }
    }

    /// True after [`seal`](Self::seal).
    pub fn is_sealed(&self) -> bool {
        *self.inner.sealed.read()
    }
}

impl AnyRegistry {
    /// Boxes `value` and registers it.
    pub fn register_any<U: Send + 'static>(&self, key: IdentityKey, value: U) -> Result<(), RegistryError> {
        self.register(key, Box::new(value))
    }
}

impl<T> fmt::Debug for SharedRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRegistry")
            .field("len", &self.inner.entries.len())
            .field("sealed", &*self.inner.sealed.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use tokio_util::sync::CancellationToken;

    fn ctx(name: &str) -> TaskContext {
        TaskContext::detached(name, Mode::Autonomous, CancellationToken::new())
    }

    #[tokio::test]
    async fn unregistered_key_returns_none() {
        let reg: SharedRegistry<u8> = SharedRegistry::new();
        let out = reg.borrow(IdentityKey::new(), &ctx("t")).await.unwrap();
        assert!(out.is_none());
        assert!(reg.try_borrow(IdentityKey::new(), &ctx("t")).is_none());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let reg = SharedRegistry::new();
        let key = IdentityKey::new();
        reg.register(key, 1).unwrap();
        assert_eq!(
            reg.register(key, 2),
            Err(RegistryError::AlreadyRegistered { key })
        );
        let g = reg.borrow(key, &ctx("t")).await.unwrap().unwrap();
        assert_eq!(*g, 1);
    }

    #[tokio::test]
    async fn replace_requires_idle_resource() {
        let reg = SharedRegistry::new();
        let key = IdentityKey::new();
        let missing = IdentityKey::new();
        reg.register(key, "a").unwrap();

        let g = reg.borrow(key, &ctx("t")).await.unwrap().unwrap();
        assert_eq!(reg.replace(key, "b"), Err(RegistryError::Busy { key }));
        reg.release(g);

        assert_eq!(reg.replace(key, "b"), Ok("a"));
        assert_eq!(
            reg.replace(missing, "c"),
            Err(RegistryError::NotRegistered { key: missing })
        );
        let g = reg.borrow(key, &ctx("t")).await.unwrap().unwrap();
        assert_eq!(*g, "b");
    }

    #[test]
    fn sealed_registry_rejects_registration() {
        let reg = SharedRegistry::new();
        let (a, b) = (IdentityKey::new(), IdentityKey::new());
        reg.register(a, ()).unwrap();
        reg.seal();
        assert!(reg.is_sealed());
        assert_eq!(reg.register(b, ()), Err(RegistryError::Sealed { key: b }));
        assert_eq!(reg.keys(), vec![a]);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn key_set_is_final_once_seal_returns() {
        let reg: SharedRegistry<usize> = SharedRegistry::new();
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    let mut added = 0;
                    loop {
                        let key = IdentityKey::new();
                        match reg.register(key, added) {
                            Ok(()) => added += 1,
                            Err(RegistryError::Sealed { .. }) => return added,
                            Err(other) => panic!("unexpected {other:?}"),
                        }
                    }
                })
            })
            .collect();

        while reg.len() < 100 {
            std::thread::yield_now();
        }
        reg.seal();
        let at_seal = reg.len();

        let added: usize = writers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(reg.len(), at_seal);
        assert_eq!(added, at_seal);
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let reg = SharedRegistry::new();
        let other = reg.clone();
        let key = IdentityKey::new();
        reg.register(key, 5_u32).unwrap();
        assert!(other.contains(key));
        let g = other.borrow(key, &ctx("t")).await.unwrap().unwrap();
        assert!(reg.lock(key).unwrap().is_held());
        drop(g);
        assert!(!reg.lock(key).unwrap().is_held());
    }

    #[tokio::test]
    async fn heterogeneous_values() {
        struct Joystick {
            x: f64,
        }
        let reg = AnyRegistry::new();
        let (js, name) = (IdentityKey::new(), IdentityKey::new());
        reg.register_any(js, Joystick { x: 0.25 }).unwrap();
        reg.register_any(name, String::from("left")).unwrap();

        let c = ctx("t");
        let g = reg.borrow(js, &c).await.unwrap().unwrap();
        assert_eq!(g.downcast_ref::<Joystick>().map(|j| j.x), Some(0.25));
        assert!(g.downcast_ref::<String>().is_none());
        drop(g);

        let mut g = reg.borrow(name, &c).await.unwrap().unwrap();
        g.downcast_mut::<String>().unwrap().push_str("-drive");
        assert_eq!(g.downcast_ref::<String>().unwrap(), "left-drive");
    }
}
