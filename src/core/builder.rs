use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{registry::Registry, supervisor::Supervisor};
use crate::{
    core::Config,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (mode changes, handler failures,
    /// shutdown progress) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor in `Config::initial_mode`.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime: subscriber workers and the
    /// event listener are spawned here.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let runtime_token = CancellationToken::new();
        let registry = Registry::new(self.cfg.initial_mode, bus.clone(), runtime_token.clone());

        let sup = Arc::new(Supervisor::new_internal(
            self.cfg,
            bus,
            subs,
            registry,
            runtime_token,
        ));
        sup.subscriber_listener();
        sup
    }
}
