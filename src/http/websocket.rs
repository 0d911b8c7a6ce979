//! WebSocket upgrade bridge.
//!
//! # Responsibilities
//! - Complete the upgrade handshake for qualifying requests
//! - Register every open channel so shutdown can close it
//! - Hand the channel to the externally supplied handler
//!
//! # Design Decisions
//! - The core defines no protocol above the channel; traffic is opaque
//! - Graceful close is a request the channel wrapper observes; forced
//!   termination aborts the handler task and is a no-op once it finished

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// Capability invoked with every established channel.
///
/// Implemented for any `Fn(ServedChannel) -> impl Future<Output = ()>`
/// closure, so callers can pass a plain async fn.
pub trait ChannelHandler: Send + Sync + 'static {
    fn handle(&self, channel: ServedChannel) -> BoxFuture<'static, ()>;
}

impl<F, Fut> ChannelHandler for F
where
    F: Fn(ServedChannel) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, channel: ServedChannel) -> BoxFuture<'static, ()> {
        Box::pin((self)(channel))
    }
}

/// A bidirectional channel handed to the configured handler.
///
/// Wraps the upgraded socket together with the shutdown close request, so a
/// handler blocked in [`recv`](Self::recv) observes server teardown.
pub struct ServedChannel {
    socket: WebSocket,
    close_rx: watch::Receiver<bool>,
}

impl ServedChannel {
    /// Receive the next message. Returns `None` when the peer closed the
    /// channel or when shutdown asked it to close (a Close frame is sent to
    /// the peer first in that case).
    pub async fn recv(&mut self) -> Option<Result<Message, axum::Error>> {
        let Self { socket, close_rx } = self;
        loop {
            // Checked without holding the watch lock across an await, which
            // keeps this future (and every handler built on it) Send.
            let close_requested = *close_rx.borrow_and_update();
            if close_requested {
                let _ = socket.send(Message::Close(None)).await;
                return None;
            }
            tokio::select! {
                msg = socket.recv() => return msg,
                changed = close_rx.changed() => {
                    if changed.is_err() {
                        // Sender gone; treat it as a close request.
                        let _ = socket.send(Message::Close(None)).await;
                        return None;
                    }
                }
            }
        }
    }

    /// Send a message to the peer.
    pub async fn send(&mut self, msg: Message) -> Result<(), axum::Error> {
        self.socket.send(msg).await
    }
}

/// Set of open upgraded channels, consulted only at shutdown.
pub struct ChannelRegistry {
    channels: DashMap<u64, ChannelHandle>,
    next_id: AtomicU64,
}

struct ChannelHandle {
    close_tx: watch::Sender<bool>,
    abort: AbortHandle,
}

impl ChannelRegistry {
    fn new() -> Self {
        Self {
            channels: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn insert(&self, close_tx: watch::Sender<bool>, abort: AbortHandle) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.channels.insert(id, ChannelHandle { close_tx, abort });
        id
    }

    fn remove(&self, id: u64) {
        self.channels.remove(&id);
    }

    /// Ask every open channel to close gracefully.
    pub fn request_close_all(&self) {
        for handle in self.channels.iter() {
            let _ = handle.close_tx.send(true);
        }
    }

    /// Forcibly terminate whatever is still open or closing. Aborting an
    /// already-finished handler task is a safe no-op.
    pub fn terminate_remaining(&self) {
        let remaining = self.channels.len();
        if remaining > 0 {
            tracing::warn!(remaining, "terminating channels that did not close in time");
        }
        for handle in self.channels.iter() {
            handle.abort.abort();
        }
    }

    /// Number of channels currently open or closing.
    pub fn open_channels(&self) -> usize {
        self.channels.len()
    }
}

/// Handoff of qualifying requests to the configured channel handler.
pub struct UpgradeBridge {
    handler: Arc<dyn ChannelHandler>,
    registry: Arc<ChannelRegistry>,
}

impl UpgradeBridge {
    pub fn new(handler: Arc<dyn ChannelHandler>) -> Self {
        Self {
            handler,
            registry: Arc::new(ChannelRegistry::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Perform the upgrade handshake and run the handler on the resulting
    /// channel, tracking it for the channel registry's lifetime.
    pub fn accept(&self, ws: WebSocketUpgrade, peer: SocketAddr) -> Response {
        let handler = Arc::clone(&self.handler);
        let registry = Arc::clone(&self.registry);
        ws.on_upgrade(move |socket| async move {
            tracing::debug!(peer = %peer, "channel opened");
            let (close_tx, close_rx) = watch::channel(false);
            let task = tokio::spawn(handler.handle(ServedChannel { socket, close_rx }));
            let id = registry.insert(close_tx, task.abort_handle());
            let _ = task.await;
            registry.remove(id);
            tracing::debug!(peer = %peer, "channel closed");
        })
    }
}
