//! Connection lifecycle tracking.
//!
//! # Responsibilities
//! - Track every accepted transport connection until its peer closes
//! - Generate unique connection IDs for tracing
//! - Force-end remaining connections at shutdown

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is sufficient since we only need uniqueness.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Set of currently-open transport connections.
///
/// Entries leave on peer close (guard drop). The registry is consulted only
/// at shutdown, when the force-close signal ends every remaining entry.
#[derive(Debug)]
pub struct ConnectionRegistry {
    active: Arc<AtomicU64>,
    force_close: broadcast::Sender<()>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        let (force_close, _) = broadcast::channel(1);
        Self {
            active: Arc::new(AtomicU64::new(0)),
            force_close,
        }
    }

    /// Register a newly accepted connection. The returned guard removes the
    /// entry on drop; the receiver fires when shutdown force-ends it.
    pub fn track(&self) -> (ConnectionGuard, broadcast::Receiver<()>) {
        self.active.fetch_add(1, Ordering::SeqCst);
        let guard = ConnectionGuard {
            active: Arc::clone(&self.active),
            id: ConnectionId::new(),
        };
        (guard, self.force_close.subscribe())
    }

    /// End every connection still in the registry. Safe with no receivers
    /// (no open connections) and safe to call more than once.
    pub fn force_close_all(&self) {
        let remaining = self.active_count();
        if remaining > 0 {
            tracing::debug!(remaining, "force-closing open connections");
        }
        let _ = self.force_close.send(());
    }

    /// Current number of open connections.
    pub fn active_count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that holds a connection's registry entry until dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn registry_counts_guards() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.active_count(), 0);

        let (guard1, _rx1) = registry.track();
        let (guard2, _rx2) = registry.track();
        assert_eq!(registry.active_count(), 2);

        drop(guard1);
        assert_eq!(registry.active_count(), 1);
        drop(guard2);
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn force_close_reaches_tracked_connections() {
        let registry = ConnectionRegistry::new();
        let (_guard, mut rx) = registry.track();

        registry.force_close_all();
        rx.recv().await.unwrap();
    }

    #[test]
    fn force_close_without_connections_is_a_noop() {
        let registry = ConnectionRegistry::new();
        registry.force_close_all();
        registry.force_close_all();
    }
}
