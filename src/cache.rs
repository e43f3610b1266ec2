//! Latest-quote cache
//!
//! Keeps the most recently dispatched quote per symbol so a newly attached
//! subscriber can see stale-but-available data before the next live tick.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::protocol::Quote;

/// Cache of the latest known quote per symbol
#[derive(Debug, Default)]
pub struct QuoteCache {
    quotes: RwLock<HashMap<String, Quote>>,
}

impl QuoteCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a quote, replacing any prior entry for the symbol wholesale
    pub fn insert(&self, quote: Quote) {
        self.quotes.write().insert(quote.symbol.clone(), quote);
    }

    /// Latest quote received for a symbol, if any
    pub fn get_latest_quote(&self, symbol: &str) -> Option<Quote> {
        self.quotes.read().get(&symbol.to_uppercase()).cloned()
    }

    /// Snapshot of every cached quote, detached from the backing map
    pub fn get_all_latest_quotes(&self) -> HashMap<String, Quote> {
        self.quotes.read().clone()
    }

    /// Number of symbols with a cached quote
    pub fn len(&self) -> usize {
        self.quotes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn quote(symbol: &str, price: rust_decimal::Decimal) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            price,
            change: dec!(1.1),
            change_percent: dec!(0.74),
            volume: 1_000_000,
            last_updated: Utc::now(),
            mock: false,
        }
    }

    #[test]
    fn test_empty_cache_returns_none() {
        let cache = QuoteCache::new();
        assert_eq!(cache.get_latest_quote("AAPL"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_replaces_wholesale() {
        let cache = QuoteCache::new();
        cache.insert(quote("AAPL", dec!(150.2)));
        cache.insert(quote("AAPL", dec!(151.0)));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_latest_quote("AAPL").unwrap().price, dec!(151.0));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let cache = QuoteCache::new();
        cache.insert(quote("AAPL", dec!(150.2)));
        assert_eq!(cache.get_latest_quote("aapl").unwrap().price, dec!(150.2));
    }

    #[test]
    fn test_other_symbols_are_untouched() {
        let cache = QuoteCache::new();
        cache.insert(quote("AAPL", dec!(150.2)));
        cache.insert(quote("MSFT", dec!(410.5)));

        assert_eq!(cache.get_latest_quote("AAPL").unwrap().price, dec!(150.2));
    }

    #[test]
    fn test_snapshot_is_a_defensive_copy() {
        let cache = QuoteCache::new();
        cache.insert(quote("AAPL", dec!(150.2)));

        let mut snapshot = cache.get_all_latest_quotes();
        snapshot.remove("AAPL");

        assert!(cache.get_latest_quote("AAPL").is_some());
    }
}
