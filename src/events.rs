//! Connection lifecycle events
//!
//! A small pub/sub table for connection-state transitions, independent of
//! any particular symbol subscription.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Connection lifecycle of the single shared transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Transition published to connection-change subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    Error { message: String },
}

/// Callback invoked on every connection transition
pub type ConnectionHandler = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// Pub/sub bus for connection-state transitions
#[derive(Default)]
pub struct ConnectionEventBus {
    handlers: parking_lot::RwLock<HashMap<u64, ConnectionHandler>>,
    next_id: AtomicU64,
}

impl ConnectionEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; the returned id unregisters it
    pub fn register(&self, handler: ConnectionHandler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.write().insert(id, handler);
        id
    }

    /// Remove a previously registered handler
    pub fn unregister(&self, id: u64) {
        self.handlers.write().remove(&id);
    }

    /// Fan an event out to every registered handler
    ///
    /// Handlers are cloned out of the lock first, so a handler may itself
    /// register or unregister without deadlocking.
    pub fn publish(&self, event: &ConnectionEvent) {
        let handlers: Vec<ConnectionHandler> = self.handlers.read().values().cloned().collect();
        for handler in handlers {
            handler(event);
        }
    }
}

/// Registration handle returned by `on_connection_change`
///
/// Call `unregister` to stop receiving transitions. Dropping the guard
/// without calling it leaves the handler registered.
pub struct ConnectionEventGuard {
    bus: Arc<ConnectionEventBus>,
    id: u64,
}

impl ConnectionEventGuard {
    pub(crate) fn new(bus: Arc<ConnectionEventBus>, id: u64) -> Self {
        Self { bus, id }
    }

    /// Stop receiving connection transitions
    pub fn unregister(self) {
        self.bus.unregister(self.id);
    }
}
