//! Static file server that keeps its served-path map synchronized with the
//! filesystem.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │                  liveserve                   │
//!                    │                                              │
//!   fs events ───────┼─▶ fswatch ──▶ routing (RouteTable)           │
//!                    │                      ▲                       │
//!   HTTP request ────┼─▶ net ──▶ http ──────┘ (lookup only)         │
//!                    │   (accept   (dispatch: 304/200/404/500,      │
//!                    │    + track)  upgrade bridge)                 │
//!                    │                                              │
//!                    │   lifecycle: start/shutdown orchestration,   │
//!                    │   signal + panic hooks, bounded grace        │
//!                    └──────────────────────────────────────────────┘
//! ```
//!
//! Requests never touch the filesystem to resolve a path: only what the
//! watchers registered is reachable, so path traversal cannot happen. The
//! lifecycle controller owns the listener, the connection and channel
//! registries, and tears everything down together within a bounded grace
//! period.

// Core subsystems
pub mod config;
pub mod fswatch;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;

pub use config::{load_config, MountConfig, ServerConfig};
pub use error::ServerError;
pub use http::{ChannelHandler, ServedChannel};
pub use lifecycle::{ServerState, StaticServer};
