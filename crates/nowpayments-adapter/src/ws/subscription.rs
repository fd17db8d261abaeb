/*
[INPUT]:  Subscription keys (payment ids or topic names) and listeners
[OUTPUT]: Ordered listener sets per key and handles for unsubscribe
[POS]:    WebSocket layer - subscription bookkeeping, survives reconnects
[UPDATE]: When changing listener identity or replay semantics
*/

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::message::InboundEvent;

pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;
pub type ListenerResult = std::result::Result<(), ListenerError>;

/// Callback invoked for every event routed to its key.
///
/// Listeners run on the connection task and should return quickly; forward
/// to a channel (see `NowPaymentsWebSocket::subscribe_channel`) for slow work.
pub type Listener = Arc<dyn Fn(&InboundEvent) -> ListenerResult + Send + Sync>;

/// Wrap a closure as a `Listener`
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&InboundEvent) -> ListenerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: Uuid,
    key: String,
}

impl SubscriptionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    NotFound,
    Removed,
    /// The key has no listeners left and should be unsubscribed remotely
    LastForKey,
}

struct Registered {
    id: Uuid,
    listener: Listener,
}

/// Key → ordered listener list.
///
/// The same `Arc` registered twice under one key is stored once.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: BTreeMap<String, Vec<Registered>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; the flag is true when the key is new
    pub fn add(&mut self, key: &str, listener: Listener) -> (SubscriptionHandle, bool) {
        let is_new_key = !self.entries.contains_key(key);
        let listeners = self.entries.entry(key.to_string()).or_default();

        let existing = listeners
            .iter()
            .find(|registered| same_listener(&registered.listener, &listener));
        if let Some(registered) = existing {
            let handle = SubscriptionHandle {
                id: registered.id,
                key: key.to_string(),
            };
            return (handle, false);
        }

        let id = Uuid::new_v4();
        listeners.push(Registered { id, listener });
        (
            SubscriptionHandle {
                id,
                key: key.to_string(),
            },
            is_new_key,
        )
    }

    pub fn remove(&mut self, handle: &SubscriptionHandle) -> Removal {
        let Some(listeners) = self.entries.get_mut(&handle.key) else {
            return Removal::NotFound;
        };
        let Some(index) = listeners.iter().position(|registered| registered.id == handle.id) else {
            return Removal::NotFound;
        };

        listeners.remove(index);
        if listeners.is_empty() {
            self.entries.remove(&handle.key);
            Removal::LastForKey
        } else {
            Removal::Removed
        }
    }

    /// Distinct keys with at least one listener
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Listeners for a key in registration order
    pub fn listeners(&self, key: &str) -> impl Iterator<Item = &Listener> {
        self.entries
            .get(key)
            .into_iter()
            .flat_map(|listeners| listeners.iter().map(|registered| &registered.listener))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn listener_count(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .entries
            .iter()
            .map(|(key, listeners)| (key.as_str(), listeners.len()))
            .collect();
        f.debug_struct("SubscriptionRegistry")
            .field("listeners", &counts)
            .finish()
    }
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
