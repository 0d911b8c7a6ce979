//! Server lifecycle orchestration.
//!
//! # Responsibilities
//! - Drive the CREATED → STARTING → LISTENING → STOPPING → STOPPED machine
//! - Bind the listener, validate roots, create watchers, start accepting
//! - Run the idempotent shutdown sequence from any trigger
//!
//! # Design Decisions
//! - Startup is ordered: bind first (the address is final before watcher
//!   setup begins), then roots, then hooks, then the accept loop
//! - Shutdown is ordered: channels (with a bounded, cancellable grace
//!   timer), then connections, then watchers, then process hooks
//! - The state mutex is held across each whole transition, which is what
//!   makes concurrent `shutdown()` calls observably idempotent

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tokio::task::{AbortHandle, JoinHandle};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::fswatch::WatchedRoot;
use crate::http::{ChannelHandler, HttpServer, UpgradeBridge};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::lifecycle::signals::SignalHooks;
use crate::net::ConnectionRegistry;
use crate::routing::{RootBinding, RouteTable};

/// How long closing channels get before forced termination.
const CHANNEL_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle states. LISTENING carries the bound address; STOPPED is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Starting,
    Listening(SocketAddr),
    Stopping,
    Stopped,
}

/// The server: owns the listener, the registries, and the watchers, and
/// orchestrates their teardown together.
#[derive(Clone)]
pub struct StaticServer {
    core: Arc<ServerCore>,
}

struct ServerCore {
    config: ServerConfig,
    table: Arc<RouteTable>,
    connections: Arc<ConnectionRegistry>,
    bridge: Option<Arc<UpgradeBridge>>,
    shutdown_signal: Arc<ShutdownSignal>,
    state_tx: watch::Sender<ServerState>,
    inner: Mutex<Inner>,
}

/// Mutable lifecycle resources, guarded by one mutex.
#[derive(Default)]
struct Inner {
    watchers: Vec<WatchedRoot>,
    accept_task: Option<JoinHandle<()>>,
    supervisor: Option<JoinHandle<()>>,
    hooks: Option<SignalHooks>,
    grace_timer: Option<AbortHandle>,
}

impl StaticServer {
    /// Build a server with no upgrade handling.
    pub fn new(config: ServerConfig) -> Self {
        Self::build(config, None)
    }

    /// Build a server that hands upgraded channels to `handler`.
    pub fn with_channel_handler(config: ServerConfig, handler: Arc<dyn ChannelHandler>) -> Self {
        Self::build(config, Some(Arc::new(UpgradeBridge::new(handler))))
    }

    fn build(config: ServerConfig, bridge: Option<Arc<UpgradeBridge>>) -> Self {
        let table = Arc::new(RouteTable::new(config.index_files.clone()));
        let (state_tx, _) = watch::channel(ServerState::Created);
        Self {
            core: Arc::new(ServerCore {
                config,
                table,
                connections: Arc::new(ConnectionRegistry::new()),
                bridge,
                shutdown_signal: Arc::new(ShutdownSignal::new()),
                state_tx,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.core.state_tx.borrow()
    }

    /// The route table backing the dispatcher. Mutated only by watchers.
    pub fn route_table(&self) -> &Arc<RouteTable> {
        &self.core.table
    }

    /// Bind and start serving. Returns the bound address.
    ///
    /// Idempotent while LISTENING: a second call returns the current bound
    /// address. A bind conflict runs the shutdown sequence and fails; any
    /// other bind fault propagates without taking the server down paths it
    /// never reached.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let core = &self.core;
        let mut inner = core.inner.lock().await;

        match self.state() {
            ServerState::Listening(addr) => return Ok(addr),
            ServerState::Stopping | ServerState::Stopped => return Err(ServerError::Stopped),
            ServerState::Created | ServerState::Starting => {}
        }
        core.state_tx.send_replace(ServerState::Starting);

        let host: IpAddr = core.config.host.parse().map_err(|source| {
            core.state_tx.send_replace(ServerState::Created);
            ServerError::InvalidHost {
                host: core.config.host.clone(),
                source,
            }
        })?;
        let addr = SocketAddr::new(host, core.config.port.unwrap_or(0));

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                tracing::error!(address = %addr, "address and port already in use");
                drop(inner);
                self.shutdown().await;
                return Err(ServerError::AddrInUse { addr });
            }
            Err(source) => {
                core.state_tx.send_replace(ServerState::Created);
                return Err(ServerError::Bind { addr, source });
            }
        };
        let bound = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        // The address is final from here on; watcher setup follows.
        log_reachability(bound);

        for mount in &core.config.serve {
            let binding = match RootBinding::new(&mount.dir, &mount.mount) {
                Ok(binding) if binding.dir().is_dir() => binding,
                _ => {
                    let path = mount.dir.clone();
                    drop(inner);
                    self.shutdown().await;
                    return Err(ServerError::NotADirectory { path });
                }
            };
            match WatchedRoot::spawn(binding, Arc::clone(&core.table)) {
                Ok(root) => inner.watchers.push(root),
                Err(e) => {
                    drop(inner);
                    self.shutdown().await;
                    return Err(ServerError::Watch(e));
                }
            }
        }

        inner.hooks = Some(SignalHooks::install(
            core.config.close_on_interrupt,
            core.config.close_on_fault,
            &core.shutdown_signal,
        ));

        // Any trigger (signal, panic, explicit) runs the same sequence.
        let mut trigger_rx = core.shutdown_signal.subscribe();
        let server = self.clone();
        inner.supervisor = Some(tokio::spawn(async move {
            if trigger_rx.recv().await.is_ok() {
                server.shutdown().await;
            }
        }));

        let http = HttpServer::new(Arc::clone(&core.table), core.bridge.clone());
        inner.accept_task = Some(tokio::spawn(http.run(
            listener,
            Arc::clone(&core.connections),
            core.shutdown_signal.subscribe(),
        )));

        core.state_tx.send_replace(ServerState::Listening(bound));
        tracing::info!(address = %bound, "HTTP server started");
        Ok(bound)
    }

    /// Run the shutdown sequence. Idempotent: safe to call repeatedly or
    /// concurrently with itself; later calls return once the first finished.
    pub async fn shutdown(&self) {
        let core = &self.core;
        let mut inner = core.inner.lock().await;
        if matches!(self.state(), ServerState::Stopping | ServerState::Stopped) {
            return;
        }
        core.state_tx.send_replace(ServerState::Stopping);
        tracing::info!("server closing...");

        // (a) ask channels to close; arm the bounded grace timer.
        if let Some(bridge) = &core.bridge {
            bridge.registry().request_close_all();
            let registry = Arc::clone(bridge.registry());
            let grace = tokio::spawn(async move {
                tokio::time::sleep(CHANNEL_GRACE).await;
                registry.terminate_remaining();
            });
            inner.grace_timer = Some(grace.abort_handle());
        }

        // (b) stop accepting, then end every tracked connection.
        core.shutdown_signal.trigger();
        if let Some(task) = inner.accept_task.take() {
            // The abort is a backstop for a trigger that raced the loop's
            // subscription; either way the listener drops here.
            task.abort();
            let _ = task.await;
        }
        core.connections.force_close_all();

        // (c) dispose watchers.
        for root in inner.watchers.drain(..) {
            root.dispose();
        }

        // (d) release process-level hooks.
        if let Some(hooks) = inner.hooks.take() {
            hooks.remove();
        }
        if let Some(supervisor) = inner.supervisor.take() {
            supervisor.abort();
        }

        // Nothing left for the grace timer to terminate: cancel it so no
        // callback outlives teardown.
        if let Some(grace) = inner.grace_timer.take() {
            let open = core
                .bridge
                .as_ref()
                .map(|b| b.registry().open_channels())
                .unwrap_or(0);
            if open == 0 {
                grace.abort();
            }
        }

        core.state_tx.send_replace(ServerState::Stopped);
        tracing::info!("server stopped");
    }

    /// Resolve once the server reaches STOPPED.
    pub async fn wait_until_stopped(&self) {
        let mut rx = self.core.state_tx.subscribe();
        let _ = rx.wait_for(|state| *state == ServerState::Stopped).await;
    }
}

fn log_reachability(bound: SocketAddr) {
    tracing::info!(address = %bound, "HTTP server listening");
    if bound.ip().is_unspecified() {
        tracing::info!(
            port = bound.port(),
            "public server reachable on every interface unless blocked by a firewall"
        );
        tracing::info!("http://127.0.0.1:{}", bound.port());
    } else if bound.ip().is_loopback() {
        tracing::info!("local server only reachable from this machine");
        tracing::info!("http://{bound}");
    } else {
        tracing::info!("http://{bound}");
    }
}
