//! # Event subscribers for the modevisor runtime.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`]
//! that fans events out to every subscriber through its own bounded queue.
//!
//! ## Architecture
//! ```text
//! broadcast / dispatch loops ── publish(Event) ──► Bus ──► Supervisor listener
//!                                                              │
//!                                                    SubscriberSet::emit(&Event)
//!                                                   ┌──────────┼──────────┐
//!                                                   ▼          ▼          ▼
//!                                               LogWriter   Metrics    Custom ...
//! ```
//!
//! With the `logging` feature, [`LogWriter`] renders every event via `tracing`.

#[cfg(feature = "logging")]
mod embedded;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
