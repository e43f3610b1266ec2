//! Configuration module for the streaming client

use serde::Deserialize;
use std::env;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Ticker symbols the demo binary subscribes to (e.g., ["AAPL", "MSFT"])
    pub symbols: Vec<String>,

    /// WebSocket endpoint of the quote stream
    pub ws_endpoint: String,

    /// Base delay for the first reconnection attempt, in milliseconds.
    /// Attempt n waits base * 2^(n-1).
    pub reconnect_delay_ms: u64,

    /// Automatic reconnection attempts before giving up.
    /// A manual connect() is required after the limit is hit.
    pub max_reconnect_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let symbols: Vec<String> = env::var("SYMBOLS")
            .unwrap_or_else(|_| "AAPL,MSFT".to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .collect();

        Ok(Self {
            symbols,
            ws_endpoint: env::var("WS_ENDPOINT")
                .unwrap_or_else(|_| "wss://localhost:8081/ws/market-data".to_string()),
            reconnect_delay_ms: env::var("RECONNECT_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            max_reconnect_attempts: env::var("MAX_RECONNECT_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbols: vec!["AAPL".to_string()],
            ws_endpoint: "wss://localhost:8081/ws/market-data".to_string(),
            reconnect_delay_ms: 1000,
            max_reconnect_attempts: 5,
        }
    }
}
