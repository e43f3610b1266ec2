//! Real-time market data streaming client
//!
//! This crate provides a resilient streaming client for live quote data:
//! one multiplexed WebSocket connection fans updates out to any number of
//! independent subscribers, survives network interruption with bounded
//! exponential-backoff reconnection, and replays every live subscription
//! after a successful reconnect.

pub mod cache;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod protocol;
pub mod subscription;
pub mod websocket;

pub use cache::QuoteCache;
pub use client::MarketStreamClient;
pub use config::Config;
pub use error::{Result, StreamError};
pub use events::{ConnectionEvent, ConnectionEventBus, ConnectionEventGuard, ConnectionState};
pub use protocol::{InboundFrame, OutboundFrame, Quote};
pub use subscription::{SubscriptionHandle, SubscriptionRegistry, WILDCARD};
pub use websocket::{ConnectionManager, Transport, TransportConn, WsTransport};
