//! Inbound frame dispatch
//!
//! Routes frames from the transport to the quote cache and to per-symbol
//! and wildcard handlers. A bad payload is logged and dropped; it must
//! never propagate out of the message path or take the connection down.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::QuoteCache;
use crate::protocol::InboundFrame;
use crate::subscription::SubscriptionRegistry;

/// Routes inbound frames to handlers and keeps the cache current
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    cache: Arc<QuoteCache>,
}

impl Dispatcher {
    pub fn new(registry: Arc<SubscriptionRegistry>, cache: Arc<QuoteCache>) -> Self {
        Self { registry, cache }
    }

    /// Handle one raw frame; frames are processed in arrival order
    pub fn handle_frame(&self, raw: &str) {
        match InboundFrame::parse(raw) {
            Ok(InboundFrame::Quote { mut data }) => {
                data.symbol = data.symbol.to_uppercase();
                self.cache.insert(data.clone());
                for handler in self.registry.handlers_for(&data.symbol) {
                    handler(&data);
                }
            }
            Ok(InboundFrame::Subscribed { symbols }) => {
                debug!(symbols = ?symbols, "subscription acknowledged");
            }
            Ok(InboundFrame::Unsubscribed { symbols }) => {
                debug!(symbols = ?symbols, "unsubscription acknowledged");
            }
            Ok(InboundFrame::Error { message }) => {
                warn!(
                    message = message.as_deref().unwrap_or("unspecified"),
                    "server reported an error"
                );
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    use crate::protocol::Quote;
    use crate::subscription::WILDCARD;

    fn quote_frame(symbol: &str, price: &str) -> String {
        format!(
            r#"{{"type":"quote","data":{{"symbol":"{symbol}","price":{price},"change":1.1,"changePercent":0.74,"volume":1000000,"lastUpdated":"2024-01-15T14:30:00Z"}}}}"#
        )
    }

    fn recorder(registry: &SubscriptionRegistry, symbols: &[String]) -> Arc<Mutex<Vec<Quote>>> {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        registry.insert(symbols, Arc::new(move |quote| sink.lock().push(quote.clone())));
        received
    }

    #[test]
    fn test_quote_updates_cache_and_fans_out() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let cache = Arc::new(QuoteCache::new());
        let received = recorder(&registry, &["AAPL".to_string()]);
        let all = recorder(&registry, &[WILDCARD.to_string()]);

        let dispatcher = Dispatcher::new(registry, cache.clone());
        dispatcher.handle_frame(&quote_frame("aapl", "150.2"));

        assert_eq!(cache.get_latest_quote("AAPL").unwrap().price, dec!(150.2));
        assert_eq!(received.lock().len(), 1);
        assert_eq!(received.lock()[0].symbol, "AAPL");
        assert_eq!(all.lock().len(), 1);
    }

    #[test]
    fn test_unrelated_symbol_does_not_reach_handler() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let cache = Arc::new(QuoteCache::new());
        let received = recorder(&registry, &["AAPL".to_string()]);

        let dispatcher = Dispatcher::new(registry, cache.clone());
        dispatcher.handle_frame(&quote_frame("MSFT", "410.5"));

        assert!(received.lock().is_empty());
        assert!(cache.get_latest_quote("MSFT").is_some());
        assert!(cache.get_latest_quote("AAPL").is_none());
    }

    #[test]
    fn test_malformed_and_ack_frames_are_swallowed() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let cache = Arc::new(QuoteCache::new());
        let received = recorder(&registry, &["AAPL".to_string()]);

        let dispatcher = Dispatcher::new(registry, cache.clone());
        dispatcher.handle_frame("{{{ not json");
        dispatcher.handle_frame(r#"{"type":"subscribed","symbols":["AAPL"]}"#);
        dispatcher.handle_frame(r#"{"type":"error","message":"boom"}"#);

        assert!(received.lock().is_empty());
        assert!(cache.is_empty());
    }
}
