//! Identity-change events and the subscriber registry providers push them through

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Authenticated user handle as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            email,
        }
    }
}

/// Payload pushed on every identity change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    SignedIn(Identity),
    SignedOut,
}

impl IdentityEvent {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            IdentityEvent::SignedIn(identity) => Some(identity),
            IdentityEvent::SignedOut => None,
        }
    }
}

type Subscribers = Mutex<HashMap<u64, mpsc::UnboundedSender<IdentityEvent>>>;

/// Fan-out of identity events to subscribers
///
/// A new subscriber immediately receives the last published event, if any,
/// so it never has to race the provider's first resolution.
pub struct IdentityBus {
    subscribers: Arc<Subscribers>,
    current: Mutex<Option<IdentityEvent>>,
    next_id: AtomicU64,
}

impl IdentityBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber
    pub fn subscribe(&self) -> IdentitySubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        // Hold the current-state lock so a concurrent publish cannot slip in
        // between the replay and the registration.
        let current = self.current.lock();
        if let Some(event) = current.clone() {
            let _ = tx.send(event);
        }
        self.subscribers.lock().insert(id, tx);
        drop(current);

        IdentitySubscription {
            id,
            rx,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Push an event to every live subscriber
    pub fn publish(&self, event: IdentityEvent) {
        let mut current = self.current.lock();
        *current = Some(event.clone());

        self.subscribers
            .lock()
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    /// Last published event
    pub fn current(&self) -> Option<IdentityEvent> {
        self.current.lock().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl Default for IdentityBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of one subscription; dropping it unsubscribes
pub struct IdentitySubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<IdentityEvent>,
    registry: Weak<Subscribers>,
}

impl IdentitySubscription {
    /// Next event, or `None` once the provider is gone
    pub async fn recv(&mut self) -> Option<IdentityEvent> {
        self.rx.recv().await
    }

    /// Explicitly end the subscription
    pub fn unsubscribe(self) {}
}

impl Drop for IdentitySubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(&self.id);
        }
    }
}
