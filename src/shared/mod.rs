//! Shared resources: keys, fair locks and the keyed registry.
//!
//! ## Contents
//! - [`IdentityKey`] opaque process-unique resource name
//! - [`ResourceLock`], [`ResourceGuard`] FIFO-fair exclusive access to one value
//! - [`SharedRegistry`] concurrent `key → lock` table; [`AnyRegistry`] for mixed value types
//!
//! ## Quick wiring
//! ```text
//! SharedRegistry::register(key, value) ─► ResourceLock { value, FIFO queue }
//!       borrow(key, &ctx).await ─► ResourceGuard ─ drop/release ─► next waiter
//! ```

mod key;
mod lock;
mod registry;

pub use key::IdentityKey;
pub use lock::{AnyResource, ResourceGuard, ResourceLock};
pub use registry::{AnyRegistry, SharedRegistry};
