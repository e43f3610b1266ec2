//! Streaming client facade
//!
//! One explicitly constructed service object owns the shared connection and
//! is passed by reference to every consumer; there is no module-level
//! singleton.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::QuoteCache;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{Result, StreamError};
use crate::events::{ConnectionEvent, ConnectionEventBus, ConnectionEventGuard, ConnectionState};
use crate::protocol::{OutboundFrame, Quote};
use crate::subscription::{SubscriptionHandle, SubscriptionRegistry, WILDCARD};
use crate::websocket::{ConnectionManager, Transport, WsTransport};

/// Real-time market data streaming client.
///
/// All subscribers share one multiplexed transport connection. The first
/// `subscribe` opens it; a lost connection is re-established with bounded
/// exponential backoff and every symbol that still has a live handler is
/// replayed to the server.
pub struct MarketStreamClient {
    manager: ConnectionManager,
    registry: Arc<SubscriptionRegistry>,
    cache: Arc<QuoteCache>,
    bus: Arc<ConnectionEventBus>,
}

impl MarketStreamClient {
    /// Build a client over the given transport
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        let config = Arc::new(config);
        let cache = Arc::new(QuoteCache::new());
        let registry = Arc::new(SubscriptionRegistry::new());
        let bus = Arc::new(ConnectionEventBus::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry), Arc::clone(&cache)));
        let manager = ConnectionManager::new(
            config,
            transport,
            dispatcher,
            Arc::clone(&registry),
            Arc::clone(&bus),
        );

        Self {
            manager,
            registry,
            cache,
            bus,
        }
    }

    /// Build a client over the production WebSocket transport
    pub fn over_websocket(config: Config) -> Self {
        Self::new(config, Arc::new(WsTransport))
    }

    /// Ensure the transport is open; see [`ConnectionManager::connect`]
    pub async fn connect(&self) -> Result<()> {
        self.manager.connect().await
    }

    /// Explicitly close the connection, dropping every subscription and
    /// suppressing automatic reconnection
    pub fn disconnect(&self) {
        self.manager.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Reconnection attempts since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.manager.reconnect_attempts()
    }

    /// Subscribe a handler to live quotes for the given symbols.
    ///
    /// Connects on first use. Symbols are upper-cased and deduplicated, and
    /// one batched subscribe frame covers the whole request. The returned
    /// handle unsubscribes this handler.
    pub async fn subscribe<S, F>(&self, symbols: &[S], handler: F) -> Result<SubscriptionHandle>
    where
        S: AsRef<str>,
        F: Fn(&Quote) + Send + Sync + 'static,
    {
        let symbols = SubscriptionRegistry::normalize(symbols);
        if symbols.is_empty() {
            return Err(StreamError::Subscription("no symbols requested".to_string()));
        }

        self.manager.connect().await?;
        let id = self.registry.insert(&symbols, Arc::new(handler));

        let frame = OutboundFrame::subscribe(symbols.clone());
        if let Err(e) = self.manager.send_frame(&frame) {
            // caller must re-issue; leave no half-registered handler behind
            self.registry.remove(id, &symbols);
            return Err(StreamError::Subscription(format!(
                "subscribe request not sent: {e}"
            )));
        }

        Ok(SubscriptionHandle::new(
            Arc::clone(&self.registry),
            self.manager.clone(),
            id,
            symbols,
        ))
    }

    /// Subscribe a handler to every symbol's updates.
    ///
    /// Wildcard handlers are a local registration: they receive whatever the
    /// symbol subscriptions bring in, and no frame goes to the server.
    pub async fn subscribe_all<F>(&self, handler: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&Quote) + Send + Sync + 'static,
    {
        self.manager.connect().await?;
        let symbols = vec![WILDCARD.to_string()];
        let id = self.registry.insert(&symbols, Arc::new(handler));
        Ok(SubscriptionHandle::new(
            Arc::clone(&self.registry),
            self.manager.clone(),
            id,
            symbols,
        ))
    }

    /// Register a handler for connection-state transitions
    pub fn on_connection_change<F>(&self, handler: F) -> ConnectionEventGuard
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        let id = self.bus.register(Arc::new(handler));
        ConnectionEventGuard::new(Arc::clone(&self.bus), id)
    }

    /// Latest quote received for a symbol, if any
    pub fn get_latest_quote(&self, symbol: &str) -> Option<Quote> {
        self.cache.get_latest_quote(symbol)
    }

    /// Snapshot of every cached quote
    pub fn get_all_latest_quotes(&self) -> HashMap<String, Quote> {
        self.cache.get_all_latest_quotes()
    }
}
