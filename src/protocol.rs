//! Wire protocol for the quote stream
//!
//! JSON frames over a full-duplex transport: outbound subscribe/unsubscribe
//! requests tagged by `action`, inbound frames tagged by `type`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A point-in-time price snapshot for one ticker symbol.
///
/// Immutable: each new quote for a symbol replaces the prior one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Upper-cased ticker symbol
    pub symbol: String,

    /// Last traded price
    pub price: Decimal,

    /// Absolute change since previous close
    pub change: Decimal,

    /// Percentage change since previous close
    pub change_percent: Decimal,

    /// Session volume
    pub volume: u64,

    /// Server-side timestamp of the tick
    pub last_updated: DateTime<Utc>,

    /// Set when the backend synthesized the tick instead of sourcing it live
    #[serde(default)]
    pub mock: bool,
}

/// Inbound frame from the quote stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFrame {
    /// Live quote update
    Quote { data: Quote },

    /// Server acknowledged a subscribe request
    Subscribed { symbols: Vec<String> },

    /// Server acknowledged an unsubscribe request
    Unsubscribed { symbols: Vec<String> },

    /// Server-side error report
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

impl InboundFrame {
    /// Parse a raw frame payload
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Outbound request frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum OutboundFrame {
    Subscribe { symbols: Vec<String> },
    Unsubscribe { symbols: Vec<String> },
}

impl OutboundFrame {
    pub fn subscribe(symbols: Vec<String>) -> Self {
        OutboundFrame::Subscribe { symbols }
    }

    pub fn unsubscribe(symbols: Vec<String>) -> Self {
        OutboundFrame::Unsubscribe { symbols }
    }

    /// The symbols this frame requests
    pub fn symbols(&self) -> &[String] {
        match self {
            OutboundFrame::Subscribe { symbols } | OutboundFrame::Unsubscribe { symbols } => {
                symbols
            }
        }
    }

    /// Encode for the wire
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_quote_frame() {
        let raw = r#"{
            "type": "quote",
            "data": {
                "symbol": "AAPL",
                "price": 150.2,
                "change": 1.1,
                "changePercent": 0.74,
                "volume": 1000000,
                "lastUpdated": "2024-01-15T14:30:00Z",
                "mock": true
            }
        }"#;

        let frame = InboundFrame::parse(raw).unwrap();
        if let InboundFrame::Quote { data } = frame {
            assert_eq!(data.symbol, "AAPL");
            assert_eq!(data.price, dec!(150.2));
            assert_eq!(data.change, dec!(1.1));
            assert_eq!(data.change_percent, dec!(0.74));
            assert_eq!(data.volume, 1_000_000);
            assert!(data.mock);
        } else {
            panic!("Expected Quote frame");
        }
    }

    #[test]
    fn test_mock_flag_defaults_to_false() {
        let raw = r#"{
            "type": "quote",
            "data": {
                "symbol": "MSFT",
                "price": 410.5,
                "change": -2.3,
                "changePercent": -0.56,
                "volume": 54321,
                "lastUpdated": "2024-01-15T14:30:00Z"
            }
        }"#;

        let frame = InboundFrame::parse(raw).unwrap();
        if let InboundFrame::Quote { data } = frame {
            assert!(!data.mock);
        } else {
            panic!("Expected Quote frame");
        }
    }

    #[test]
    fn test_parse_ack_frames() {
        let frame = InboundFrame::parse(r#"{"type":"subscribed","symbols":["AAPL","MSFT"]}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Subscribed {
                symbols: vec!["AAPL".to_string(), "MSFT".to_string()]
            }
        );

        let frame = InboundFrame::parse(r#"{"type":"unsubscribed","symbols":["AAPL"]}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Unsubscribed {
                symbols: vec!["AAPL".to_string()]
            }
        );
    }

    #[test]
    fn test_parse_error_frame_with_and_without_message() {
        let frame = InboundFrame::parse(r#"{"type":"error","message":"unknown symbol"}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Error {
                message: Some("unknown symbol".to_string())
            }
        );

        let frame = InboundFrame::parse(r#"{"type":"error","code":500}"#).unwrap();
        assert_eq!(frame, InboundFrame::Error { message: None });
    }

    #[test]
    fn test_malformed_payloads_are_errors() {
        assert!(InboundFrame::parse("not json at all").is_err());
        assert!(InboundFrame::parse(r#"{"type":"heartbeat"}"#).is_err());
        assert!(InboundFrame::parse(r#"{"type":"quote","data":{"symbol":"AAPL"}}"#).is_err());
    }

    #[test]
    fn test_outbound_frame_encoding() {
        let frame = OutboundFrame::subscribe(vec!["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(
            frame.to_json().unwrap(),
            r#"{"action":"subscribe","symbols":["AAPL","MSFT"]}"#
        );

        let frame = OutboundFrame::unsubscribe(vec!["AAPL".to_string()]);
        assert_eq!(
            frame.to_json().unwrap(),
            r#"{"action":"unsubscribe","symbols":["AAPL"]}"#
        );
    }
}
