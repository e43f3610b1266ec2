//! Connection manager
//!
//! Owns the single transport connection shared by all subscribers, the
//! connect/reconnect state machine, and the exponential backoff schedule.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::transport::{Transport, TransportConn};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{Result, StreamError};
use crate::events::{ConnectionEvent, ConnectionEventBus, ConnectionState};
use crate::protocol::OutboundFrame;
use crate::subscription::SubscriptionRegistry;

/// The single pending connection attempt; concurrent callers await a clone
/// of the same future instead of racing a second handshake.
type PendingConnect = Shared<BoxFuture<'static, Result<()>>>;

enum Command {
    Frame(String),
    Close,
}

struct Inner {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<SubscriptionRegistry>,
    bus: Arc<ConnectionEventBus>,
    state: Mutex<ConnectionState>,
    pending: Mutex<Option<PendingConnect>>,
    out_tx: Mutex<Option<UnboundedSender<Command>>>,
    attempts: AtomicU32,
    /// Bumped per established connection; a pump observing a stale value
    /// must not touch shared state on its way out.
    conn_gen: AtomicU64,
    explicit_disconnect: AtomicBool,
}

/// Manages the shared connection with automatic bounded reconnection
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        config: Arc<Config>,
        transport: Arc<dyn Transport>,
        dispatcher: Arc<Dispatcher>,
        registry: Arc<SubscriptionRegistry>,
        bus: Arc<ConnectionEventBus>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                dispatcher,
                registry,
                bus,
                state: Mutex::new(ConnectionState::Disconnected),
                pending: Mutex::new(None),
                out_tx: Mutex::new(None),
                attempts: AtomicU32::new(0),
                conn_gen: AtomicU64::new(0),
                explicit_disconnect: AtomicBool::new(false),
            }),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Reconnection attempts since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: ConnectionState) {
        *self.inner.state.lock() = next;
    }

    /// Ensure the transport is open.
    ///
    /// Idempotent: resolves immediately when already connected; when an
    /// attempt is already pending, the caller attaches to it rather than
    /// starting a second one.
    pub async fn connect(&self) -> Result<()> {
        let pending = {
            let mut slot = self.inner.pending.lock();
            if self.is_connected() {
                return Ok(());
            }
            match slot.as_ref() {
                Some(attempt) => attempt.clone(),
                None => {
                    let this = self.clone();
                    let attempt: PendingConnect = async move {
                        let outcome = this.establish().await;
                        *this.inner.pending.lock() = None;
                        outcome
                    }
                    .boxed()
                    .shared();
                    *slot = Some(attempt.clone());
                    attempt
                }
            }
        };
        pending.await
    }

    async fn establish(&self) -> Result<()> {
        self.inner.explicit_disconnect.store(false, Ordering::SeqCst);
        self.set_state(ConnectionState::Connecting);
        info!(endpoint = %self.inner.config.ws_endpoint, "connecting to quote stream");

        let mut conn = match self.inner.transport.connect(&self.inner.config.ws_endpoint).await {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, "connection attempt failed");
                self.inner.bus.publish(&ConnectionEvent::Error {
                    message: e.to_string(),
                });
                self.set_state(ConnectionState::Disconnected);
                self.inner.bus.publish(&ConnectionEvent::Disconnected);
                if !self.inner.explicit_disconnect.load(Ordering::SeqCst) {
                    self.schedule_reconnect();
                }
                return Err(e);
            }
        };

        if self.inner.explicit_disconnect.load(Ordering::SeqCst) {
            // disconnect() raced the handshake
            conn.close().await;
            return Err(StreamError::ConnectionClosed);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.attempts.store(0, Ordering::SeqCst);
        *self.inner.out_tx.lock() = Some(tx);
        self.set_state(ConnectionState::Connected);
        self.inner.bus.publish(&ConnectionEvent::Connected);

        // The replay must reach the wire before the pump is allowed to
        // dispatch any inbound frame of the new connection.
        if let Some(frame) = self.inner.registry.replay_frame() {
            info!(symbols = ?frame.symbols(), "replaying active subscriptions");
            let sent = match frame.to_json() {
                Ok(raw) => conn.send(raw).await,
                Err(e) => Err(StreamError::Serialization(e.to_string())),
            };
            if let Err(e) = sent {
                warn!(error = %e, "failed to replay subscriptions");
                conn.close().await;
                *self.inner.out_tx.lock() = None;
                self.set_state(ConnectionState::Disconnected);
                self.inner.bus.publish(&ConnectionEvent::Disconnected);
                self.schedule_reconnect();
                return Err(e);
            }
        }

        let conn_gen = self.inner.conn_gen.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::spawn(self.clone().pump(conn, rx, conn_gen));

        Ok(())
    }

    /// Drive one open connection: outbound commands against inbound frames
    async fn pump(
        self,
        mut conn: Box<dyn TransportConn>,
        mut commands: UnboundedReceiver<Command>,
        conn_gen: u64,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Frame(raw)) => {
                        if let Err(e) = conn.send(raw).await {
                            warn!(error = %e, "failed to send frame");
                            self.inner.bus.publish(&ConnectionEvent::Error {
                                message: e.to_string(),
                            });
                            break;
                        }
                    }
                    Some(Command::Close) | None => {
                        conn.close().await;
                        break;
                    }
                },
                inbound = conn.recv() => match inbound {
                    Ok(Some(raw)) => self.inner.dispatcher.handle_frame(&raw),
                    Ok(None) => {}
                    Err(StreamError::ConnectionClosed) => {
                        info!("quote stream closed by remote");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "transport error");
                        self.inner.bus.publish(&ConnectionEvent::Error {
                            message: e.to_string(),
                        });
                        break;
                    }
                },
            }
        }
        self.connection_lost(conn_gen);
    }

    fn connection_lost(&self, conn_gen: u64) {
        if self.inner.conn_gen.load(Ordering::SeqCst) != conn_gen {
            // a newer connection owns the shared state
            return;
        }
        *self.inner.out_tx.lock() = None;
        self.set_state(ConnectionState::Disconnected);
        self.inner.bus.publish(&ConnectionEvent::Disconnected);
        if !self.inner.explicit_disconnect.load(Ordering::SeqCst) {
            self.schedule_reconnect();
        }
    }

    /// Schedule the next backoff attempt; terminal once the attempt limit
    /// is reached, until a manual `connect()`.
    fn schedule_reconnect(&self) {
        let previous = self.inner.attempts.load(Ordering::SeqCst);
        if previous >= self.inner.config.max_reconnect_attempts {
            error!(
                attempts = previous,
                "max reconnection attempts exceeded; waiting for a manual connect"
            );
            return;
        }

        let attempt = previous + 1;
        self.inner.attempts.store(attempt, Ordering::SeqCst);
        let delay = backoff_delay(self.inner.config.reconnect_delay_ms, attempt);
        self.set_state(ConnectionState::Reconnecting);
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );

        let this = self.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            if this.inner.explicit_disconnect.load(Ordering::SeqCst) {
                return;
            }
            if let Err(e) = this.connect().await {
                debug!(error = %e, attempt, "reconnect attempt failed");
            }
        });
    }

    /// Serialize a frame and hand it to the open connection
    pub fn send_frame(&self, frame: &OutboundFrame) -> Result<()> {
        let raw = frame
            .to_json()
            .map_err(|e| StreamError::Serialization(e.to_string()))?;
        match self.inner.out_tx.lock().as_ref() {
            Some(tx) => tx
                .send(Command::Frame(raw))
                .map_err(|_| StreamError::NotConnected),
            None => Err(StreamError::NotConnected),
        }
    }

    /// Explicit, idempotent close: clears all subscription state and
    /// suppresses automatic reconnection.
    pub fn disconnect(&self) {
        info!("disconnecting quote stream");
        self.inner.explicit_disconnect.store(true, Ordering::SeqCst);
        self.inner.registry.clear();
        self.inner.conn_gen.fetch_add(1, Ordering::SeqCst);
        if let Some(tx) = self.inner.out_tx.lock().take() {
            let _ = tx.send(Command::Close);
        }
        if self.state() != ConnectionState::Disconnected {
            self.set_state(ConnectionState::Disconnected);
            self.inner.bus.publish(&ConnectionEvent::Disconnected);
        }
    }
}

/// Delay before reconnect attempt `attempt` (1-based): base * 2^(attempt-1)
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(63);
    Duration::from_millis(base_ms.saturating_mul(1u64 << shift))
}
