use std::{
    fmt::Display,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use tracing::trace;

use crate::{adapter::ConnectionId, transport::TransportError};

/// Something which can be dispatched on an [`EventChannel`].
pub trait Payload {
    /// Empty payloads are not dispatched.
    fn is_empty(&self) -> bool {
        false
    }
}

/// Bytes arrived from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedData {
    /// The connection the bytes arrived on.
    pub connection_id: ConnectionId,

    /// The bytes.
    pub data: Bytes,
}

impl Payload for ReceivedData {
    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Reading from the wire failed.
#[derive(Debug)]
pub struct ReceiveError {
    /// The connection the error happened on.
    pub connection_id: ConnectionId,

    /// What went wrong.
    pub error: TransportError,
}

impl Payload for ReceiveError {}

/// Returned by [`EventChannel::add_listener`], needed for removing the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

impl Display for ListenerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_token: u64,
    listeners: Vec<(ListenerToken, Listener<T>)>,
}

/// A register of listeners.
///
/// Clones share the same register.
/// Dispatching calls the most recently added listener first.
pub struct EventChannel<T> {
    name: &'static str,
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            registry: self.registry.clone(),
        }
    }
}

impl<T: Payload> std::fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .field("listeners", &self.len())
            .finish()
    }
}

impl<T: Payload> EventChannel<T> {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            registry: Arc::new(Mutex::new(Registry {
                next_token: 0,
                listeners: vec![],
            })),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a listener.
    /// Adding the same closure twice means it is called twice.
    pub fn add_listener<F>(&self, listener: F) -> ListenerToken
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut registry = self.registry();

        let token = ListenerToken(registry.next_token);
        registry.next_token += 1;
        registry.listeners.push((token, Arc::new(listener)));

        trace!(channel = self.name, %token, "Listener added");
        token
    }

    /// Remove a listener.
    /// Returns false if the listener was not (or no longer) registered.
    pub fn remove_listener(&self, token: ListenerToken) -> bool {
        let mut registry = self.registry();

        match registry.listeners.iter().rposition(|(t, _)| *t == token) {
            Some(index) => {
                registry.listeners.remove(index);
                trace!(channel = self.name, %token, "Listener removed");
                true
            }
            None => false,
        }
    }

    /// How many listeners are registered.
    pub fn len(&self) -> usize {
        self.registry().listeners.len()
    }

    /// True if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every listener.
    pub(crate) fn clear(&self) {
        let removed = {
            let mut registry = self.registry();
            std::mem::take(&mut registry.listeners).len()
        };

        if removed > 0 {
            trace!(channel = self.name, removed, "Listeners cleared");
        }
    }

    /// Call every listener with the payload, most recently added first.
    /// Returns how many listeners were called.
    pub(crate) fn dispatch(&self, payload: &T) -> usize {
        if payload.is_empty() {
            trace!(channel = self.name, "Empty payload, not dispatching");
            return 0;
        }

        // Listeners may add or remove listeners, so don't hold the lock while calling them.
        let listeners = self
            .registry()
            .listeners
            .iter()
            .rev()
            .map(|(_, listener)| listener.clone())
            .collect::<Vec<_>>();

        for listener in &listeners {
            listener(payload);
        }

        trace!(
            channel = self.name,
            "Dispatched to {} listener(s)",
            listeners.len()
        );
        listeners.len()
    }
}
