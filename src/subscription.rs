//! Subscription registry
//!
//! Tracks which symbols have live handlers. A symbol is in the active set
//! if and only if its handler set is non-empty; the instant the last
//! handler for a symbol is removed, the symbol leaves the set and an
//! unsubscribe frame is owed to the server.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::protocol::{OutboundFrame, Quote};
use crate::websocket::ConnectionManager;

/// Registry key for handlers that receive every symbol's updates
pub const WILDCARD: &str = "*";

/// Callback invoked with each dispatched quote
pub type QuoteHandler = Arc<dyn Fn(&Quote) + Send + Sync>;

struct HandlerEntry {
    id: u64,
    handler: QuoteHandler,
}

/// Tracks live handlers per upper-cased symbol (plus the wildcard key)
#[derive(Default)]
pub struct SubscriptionRegistry {
    handlers: RwLock<HashMap<String, Vec<HandlerEntry>>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper-case, trim, deduplicate and sort a requested symbol list
    pub fn normalize<S: AsRef<str>>(symbols: &[S]) -> Vec<String> {
        let set: BTreeSet<String> = symbols
            .iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        set.into_iter().collect()
    }

    /// Record a handler under each of the given (already normalized) symbols.
    ///
    /// Returns the handler id used to remove it again.
    pub fn insert(&self, symbols: &[String], handler: QuoteHandler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut table = self.handlers.write();
        for symbol in symbols {
            table.entry(symbol.clone()).or_default().push(HandlerEntry {
                id,
                handler: Arc::clone(&handler),
            });
        }
        id
    }

    /// Remove a handler from each of the given symbols.
    ///
    /// Returns the symbols whose handler set became empty (the wildcard key
    /// never appears in the result; it has no server-side subscription).
    pub fn remove(&self, id: u64, symbols: &[String]) -> Vec<String> {
        let mut table = self.handlers.write();
        let mut emptied = Vec::new();
        for symbol in symbols {
            if let Some(entries) = table.get_mut(symbol) {
                entries.retain(|entry| entry.id != id);
                if entries.is_empty() {
                    table.remove(symbol);
                    if symbol != WILDCARD {
                        emptied.push(symbol.clone());
                    }
                }
            }
        }
        emptied
    }

    /// Handlers registered for a symbol, plus every wildcard handler
    pub fn handlers_for(&self, symbol: &str) -> Vec<QuoteHandler> {
        let table = self.handlers.read();
        let mut handlers = Vec::new();
        if let Some(entries) = table.get(symbol) {
            handlers.extend(entries.iter().map(|entry| Arc::clone(&entry.handler)));
        }
        if let Some(entries) = table.get(WILDCARD) {
            handlers.extend(entries.iter().map(|entry| Arc::clone(&entry.handler)));
        }
        handlers
    }

    /// Sorted symbols that currently have at least one live handler
    pub fn active_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .handlers
            .read()
            .keys()
            .filter(|symbol| symbol.as_str() != WILDCARD)
            .cloned()
            .collect();
        symbols.sort();
        symbols
    }

    /// Subscribe frame covering the full active set, for replay after reconnect
    pub fn replay_frame(&self) -> Option<OutboundFrame> {
        let symbols = self.active_symbols();
        if symbols.is_empty() {
            None
        } else {
            Some(OutboundFrame::subscribe(symbols))
        }
    }

    /// Drop every handler and symbol (explicit disconnect)
    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}

/// Live registration of interest returned by `subscribe`/`subscribe_all`.
///
/// The Rust rendering of the unsubscribe closure: consuming it removes the
/// handler from every symbol it was registered under and sends one
/// unsubscribe frame per symbol left without handlers.
pub struct SubscriptionHandle {
    registry: Arc<SubscriptionRegistry>,
    manager: ConnectionManager,
    id: u64,
    symbols: Vec<String>,
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("symbols", &self.symbols)
            .finish()
    }
}

impl SubscriptionHandle {
    pub(crate) fn new(
        registry: Arc<SubscriptionRegistry>,
        manager: ConnectionManager,
        id: u64,
        symbols: Vec<String>,
    ) -> Self {
        Self {
            registry,
            manager,
            id,
            symbols,
        }
    }

    /// Symbols this registration covers
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Remove the handler; takes effect for all future dispatch immediately
    pub fn unsubscribe(self) {
        let emptied = self.registry.remove(self.id, &self.symbols);
        for symbol in emptied {
            let frame = OutboundFrame::unsubscribe(vec![symbol.clone()]);
            if let Err(e) = self.manager.send_frame(&frame) {
                debug!(symbol = %symbol, error = %e, "unsubscribe frame not sent");
            }
        }
    }
}
