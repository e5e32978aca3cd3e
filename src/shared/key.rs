//! # Opaque resource keys.
//!
//! An [`IdentityKey`] names one entry of the [`SharedRegistry`](crate::SharedRegistry).
//! Keys are drawn from a process-wide counter, so two keys compare equal only
//! when one is a copy of the other.
//!
//! Wiring code usually creates keys once and keeps them in statics:
//! ```rust
//! use std::sync::LazyLock;
//! use modevisor::IdentityKey;
//!
//! static JOYSTICKS: LazyLock<[IdentityKey; 4]> = LazyLock::new(IdentityKey::create_array);
//! static DRIVE_LEFT: LazyLock<IdentityKey> = LazyLock::new(IdentityKey::new);
//!
//! assert_ne!(JOYSTICKS[0], *DRIVE_LEFT);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Source of key identities. Zero is never handed out.
static KEY_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique token naming a shared resource.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityKey(u64);

impl IdentityKey {
    /// Creates a key distinct from every key created before it.
    pub fn new() -> Self {
        Self(KEY_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Creates `count` mutually distinct keys.
    pub fn create_set(count: usize) -> Vec<IdentityKey> {
        (0..count).map(|_| IdentityKey::new()).collect()
    }

    /// Fixed-size variant of [`create_set`](Self::create_set).
    pub fn create_array<const N: usize>() -> [IdentityKey; N] {
        std::array::from_fn(|_| IdentityKey::new())
    }

    /// Raw identity, for logs and events.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for IdentityKey {
    /// Same as [`IdentityKey::new`]: every default key is fresh.
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityKey({})", self.0)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key#{}", self.0)
    }
}
