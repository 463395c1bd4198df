//! # Event bus for queue lifecycle events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. Every [`TaskQueue`]
//! owns one; task drivers, the retry/repeat engine and the queue itself publish into it.
//!
//! ```text
//! Publishers (many):                     Subscribers (any number):
//!   driver (task 1) ──┐
//!   driver (task N) ──┼──────► Bus ───────► queue.subscribe() ─► your receiver
//!   retry engine    ──┤  (broadcast chan)
//!   TaskQueue       ──┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks and never fails.
//! - **Bounded capacity**: one ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if nobody is subscribed at send time.
//!
//! [`TaskQueue`]: crate::TaskQueue

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for queue events.
///
/// Cheap to clone (holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no receivers the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn subscribers_only_see_later_events() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::QueueSuspended));

        let mut rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);
        bus.publish(Event::new(EventKind::QueueResumed).with_queue("main"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::QueueResumed);
        assert_eq!(ev.queue.as_deref(), Some("main"));
    }
}
