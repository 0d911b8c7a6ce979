//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, hyper connection, registry entry)
//!     → dispatch.rs (method check → table lookup → 304/200/404/500)
//!     → websocket.rs (upgrade handoff when a channel handler exists)
//! ```

pub mod dispatch;
pub mod server;
pub mod websocket;

pub use dispatch::AppState;
pub use server::HttpServer;
pub use websocket::{ChannelHandler, ChannelRegistry, ServedChannel, UpgradeBridge};
