//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → accept loop (http::server)
//!     → connection.rs (registry entry, guard-on-drop)
//!     → served by hyper until peer close or forced end at shutdown
//! ```
//!
//! # Design Decisions
//! - Each connection is tracked so shutdown can end the stragglers
//! - Forced close is a broadcast every connection task races against
//! - Upgraded connections leave this registry; the channel registry owns
//!   them from the handshake on

pub mod connection;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionRegistry};
