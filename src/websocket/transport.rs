//! Transport seam for the quote stream
//!
//! The connection machinery talks to the wire through these traits; the
//! production implementation rides tokio-tungstenite, tests substitute a
//! scripted in-memory transport.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::error::{Result, StreamError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Factory for duplex frame connections
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to the endpoint
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn TransportConn>>;
}

/// A single open duplex connection carrying text frames
#[async_trait]
pub trait TransportConn: Send {
    /// Send one outbound frame
    async fn send(&mut self, frame: String) -> Result<()>;

    /// Receive the next event.
    ///
    /// `Ok(Some(_))` is a data frame, `Ok(None)` a non-data frame
    /// (ping/pong and the like), and `Err(_)` means the connection is over:
    /// `ConnectionClosed` for a close, any other error for a transport fault.
    async fn recv(&mut self) -> Result<Option<String>>;

    /// Close the connection
    async fn close(&mut self);
}

/// Production transport over tokio-tungstenite
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn TransportConn>> {
        let (stream, response) = connect_async(endpoint).await.map_err(|e| {
            StreamError::Connection(format!("Failed to connect: {}", e))
        })?;

        info!(status = ?response.status(), "WebSocket connected");
        Ok(Box::new(WsConn { stream }))
    }
}

struct WsConn {
    stream: WsStream,
}

#[async_trait]
impl TransportConn for WsConn {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.stream
            .send(Message::Text(frame))
            .await
            .map_err(|e| StreamError::Message(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        match self.stream.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!(len = text.len(), "Received text message");
                Ok(Some(text))
            }
            Some(Ok(Message::Binary(data))) => {
                Ok(Some(String::from_utf8_lossy(&data).to_string()))
            }
            Some(Ok(Message::Ping(data))) => {
                debug!("Received ping, sending pong");
                let _ = self.stream.send(Message::Pong(data)).await;
                Ok(None)
            }
            Some(Ok(Message::Pong(_))) => Ok(None),
            Some(Ok(Message::Close(frame))) => {
                warn!(frame = ?frame, "Received close frame");
                Err(StreamError::ConnectionClosed)
            }
            Some(Ok(Message::Frame(_))) => Ok(None),
            Some(Err(e)) => Err(StreamError::Message(e.to_string())),
            None => {
                warn!("WebSocket stream ended");
                Err(StreamError::ConnectionClosed)
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
