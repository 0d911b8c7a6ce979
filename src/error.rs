//! Error taxonomy for startup-surface faults.
//!
//! Per-request faults never appear here: the dispatcher contains them and
//! renders a 500 response. Everything in this enum is surfaced to the caller
//! of [`StaticServer::start`](crate::StaticServer::start).

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal faults surfaced while starting (or failing to start) a server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configured root is missing or not a directory.
    #[error("{} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// The bind address is already in use. The server has already run its
    /// shutdown sequence when this is returned.
    #[error("address already in use: {addr}")]
    AddrInUse { addr: SocketAddr },

    /// Any other bind fault.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The configured host is not a valid IP address.
    #[error("invalid bind host {host:?}: {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// Creating a filesystem watcher for a root failed.
    #[error("filesystem watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// `start()` was called on a server that has already shut down.
    /// STOPPED is terminal; build a fresh server to serve again.
    #[error("server already stopped")]
    Stopped,
}
