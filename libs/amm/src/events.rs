//! Event fan-out to collaborators
//!
//! Every subscriber gets its own channel and receives each event emitted
//! after it subscribed. Bounded subscribers that fall behind miss events
//! instead of stalling the emitter. Dropped receivers are pruned on the
//! next emit.

use basin_types::AmmEvent;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{trace, warn};

/// Cloneable handle onto a shared set of event subscribers
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Sender<AmmEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber that never misses an event.
    ///
    /// The channel is unbounded: events queue up in memory until the
    /// receiver drains them or is dropped. Long-lived consumers that may
    /// stop reading should use [`EventBus::subscribe_bounded`].
    pub fn subscribe(&self) -> Receiver<AmmEvent> {
        let (sender, receiver) = unbounded();
        self.subscribers.write().push(sender);
        receiver
    }

    /// Register a subscriber holding at most `capacity` undelivered events.
    ///
    /// Events emitted while the queue is full are dropped for this
    /// subscriber only; it stays subscribed. A zero capacity is raised to one.
    pub fn subscribe_bounded(&self, capacity: usize) -> Receiver<AmmEvent> {
        let (sender, receiver) = bounded(capacity.max(1));
        self.subscribers.write().push(sender);
        receiver
    }

    /// Deliver an event to every live subscriber
    pub fn emit(&self, event: AmmEvent) {
        trace!(?event, "emit");

        let mut subscribers = self.subscribers.write();
        subscribers.retain(|sender| match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                warn!(event = ?dropped, "subscriber queue full, event dropped");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
