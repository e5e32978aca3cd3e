//! Failure backoff policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] pause schedule after consecutive handler failures (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization so tasks failing together do not retry in lockstep
//!
//! ## Quick wiring
//! ```text
//! Config { backoff: BackoffPolicy, .. }
//!      └─► core::actor::TaskActor: handler Failed ─► backoff.next(failures) ─► ctx.sleep(delay)
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=100ms, factor=2.0, max=5s, jitter=None.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
