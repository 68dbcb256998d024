//! Status Broadcaster — fan-out of coordinator events to browser observers.
//!
//! Each observer is a bounded mpsc sender; `publish` uses `try_send` so one
//! slow or dead socket can never delay delivery to the others. An observer
//! whose channel is full or closed is unregistered, not retried.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;
use waylink_core::event::WireEvent;

/// Per-observer queue depth. A browser tab that stops draining 32 frames is
/// considered dead.
const OBSERVER_QUEUE: usize = 32;

#[derive(Default)]
pub struct Broadcaster {
    observers: Mutex<HashMap<Uuid, mpsc::Sender<WireEvent>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer and immediately queue `first` — the single event that
    /// brings a late joiner up to date with the current snapshot.
    pub fn register(&self, first: WireEvent) -> (Uuid, mpsc::Receiver<WireEvent>) {
        let (tx, rx) = mpsc::channel(OBSERVER_QUEUE);
        // Fresh channel, cannot be full.
        let _ = tx.try_send(first);
        let id = Uuid::new_v4();
        self.observers.lock().unwrap().insert(id, tx);
        debug!("observer {id} registered");
        (id, rx)
    }

    /// Remove an observer. Idempotent.
    pub fn unregister(&self, id: Uuid) {
        if self.observers.lock().unwrap().remove(&id).is_some() {
            debug!("observer {id} unregistered");
        }
    }

    /// Deliver `event` to every registered observer, pruning the ones whose
    /// queue is full or whose socket task is gone.
    pub fn publish(&self, event: &WireEvent) {
        let mut observers = self.observers.lock().unwrap();
        observers.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(e) => {
                debug!("dropping observer {id}: {e}");
                false
            }
        });
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_delivers_first_event() {
        let b = Broadcaster::new();
        let (_id, mut rx) = b.register(WireEvent::AskPhone);
        assert_eq!(rx.recv().await.unwrap(), WireEvent::AskPhone);
    }

    #[tokio::test]
    async fn test_publish_preserves_order() {
        let b = Broadcaster::new();
        let (_id, mut rx) = b.register(WireEvent::AskPhone);
        b.publish(&WireEvent::status("one"));
        b.publish(&WireEvent::status("two"));
        assert_eq!(rx.recv().await.unwrap(), WireEvent::AskPhone);
        assert_eq!(rx.recv().await.unwrap(), WireEvent::status("one"));
        assert_eq!(rx.recv().await.unwrap(), WireEvent::status("two"));
    }

    #[tokio::test]
    async fn test_dead_observer_does_not_block_healthy_one() {
        let b = Broadcaster::new();
        let (_dead_id, dead_rx) = b.register(WireEvent::AskPhone);
        drop(dead_rx);
        let (_ok_id, mut ok_rx) = b.register(WireEvent::AskPhone);

        b.publish(&WireEvent::status("still flowing"));

        assert_eq!(ok_rx.recv().await.unwrap(), WireEvent::AskPhone);
        assert_eq!(ok_rx.recv().await.unwrap(), WireEvent::status("still flowing"));
        // The dead observer was pruned on publish.
        assert_eq!(b.observer_count(), 1);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let b = Broadcaster::new();
        let (id, _rx) = b.register(WireEvent::AskPhone);
        b.unregister(id);
        b.unregister(id);
        assert_eq!(b.observer_count(), 0);
    }
}
