//! HTTP server setup and the accept loop.
//!
//! # Responsibilities
//! - Build the axum router (everything funnels into the dispatcher)
//! - Accept connections and register each in the connection registry
//! - Serve each connection with hyper, upgrades enabled
//! - Race every connection against the forced-close signal
//!
//! # Design Decisions
//! - The accept loop is owned here rather than delegated to `axum::serve`,
//!   so shutdown can stop accepting and end tracked connections itself
//! - Malformed requests never reach the dispatcher: hyper answers them with
//!   a minimal 400 and the connection future returns the parse error

use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::{Extension, Router};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::http::dispatch::{dispatch, AppState};
use crate::http::websocket::UpgradeBridge;
use crate::net::ConnectionRegistry;
use crate::routing::RouteTable;

/// The HTTP surface: one router, one accept loop.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(table: Arc<RouteTable>, bridge: Option<Arc<UpgradeBridge>>) -> Self {
        let state = AppState { table, bridge };
        let router = Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(TraceLayer::new_for_http());
        Self { router }
    }

    /// Accept connections until the shutdown signal fires, serving each on
    /// its own task. The listener is dropped on return, so no further
    /// connections are accepted.
    pub async fn run(
        self,
        listener: TcpListener,
        registry: Arc<ConnectionRegistry>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };

            let (guard, mut force_close) = registry.track();
            let app = self.router.clone().layer(Extension(ConnectInfo(peer)));
            tokio::spawn(async move {
                let service = TowerToHyperService::new(app);
                // The builder must outlive the connection future it lends
                // itself to.
                let builder = auto::Builder::new(TokioExecutor::new());
                let conn =
                    builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
                tokio::pin!(conn);

                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            tracing::debug!(
                                peer = %peer,
                                connection_id = %guard.id(),
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    }
                    _ = force_close.recv() => {
                        tracing::debug!(
                            peer = %peer,
                            connection_id = %guard.id(),
                            "connection force-closed at shutdown"
                        );
                    }
                }
                drop(guard);
            });
        }
        tracing::debug!("accept loop stopped");
    }
}
