use crate::traits::{ConnectionEvent, EventListener};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Identifies a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A registered receiver of events
#[derive(Clone)]
enum Entry {
    Listener(Arc<dyn EventListener>),
    Channel(Sender<ConnectionEvent>),
}

/// Ordered fan-out of connection events
///
/// Listeners are called in registration order. The registry is
/// snapshotted before each dispatch, so listeners may add or remove
/// listeners while being called; changes apply from the next event.
#[derive(Default)]
pub struct EventDispatcher {
    entries: RwLock<Vec<(ListenerId, Entry)>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        self.register(Entry::Listener(listener))
    }

    fn register(&self, entry: Entry) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, entry));
        id
    }

    /// Remove a listener; returns `false` if it was not registered
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Register a channel subscription and return its receiving end
    ///
    /// Dropping the receiver unsubscribes: the entry is pruned on the
    /// first dispatch that finds the channel disconnected.
    pub fn subscribe(&self) -> (ListenerId, Receiver<ConnectionEvent>) {
        let (tx, rx) = unbounded();
        let id = self.register(Entry::Channel(tx));
        (id, rx)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver one event to every listener
    ///
    /// A listener error is logged and does not stop delivery to the rest.
    pub fn dispatch(&self, event: &ConnectionEvent) {
        let snapshot: Vec<_> = self.entries.read().clone();
        let mut disconnected = Vec::new();

        for (id, entry) in snapshot {
            match entry {
                Entry::Listener(listener) => {
                    if let Err(e) = listener.on_event(event) {
                        warn!("Listener {:?} failed on {} event: {}", id, event.kind(), e);
                    }
                }
                Entry::Channel(tx) => {
                    if tx.send(event.clone()).is_err() {
                        disconnected.push(id);
                    }
                }
            }
        }

        if !disconnected.is_empty() {
            debug!("Pruning {} dropped subscriptions", disconnected.len());
            self.entries
                .write()
                .retain(|(id, _)| !disconnected.contains(id));
        }
    }
}
