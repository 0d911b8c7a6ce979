//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (controller.rs):
//!     Bind listener → log reachability → validate roots → spawn watchers
//!     → install hooks → start accept loop → LISTENING
//!
//! Shutdown (controller.rs, via shutdown.rs triggers):
//!     Close channels (2 s grace, then force) → stop accepting → end
//!     connections → dispose watchers → remove hooks → STOPPED
//!
//! Signals (signals.rs):
//!     Ctrl-C / escaped panic → trigger the shared shutdown signal
//! ```
//!
//! # Design Decisions
//! - Every shutdown trigger funnels into one idempotent sequence
//! - STOPPED is terminal; a server value serves at most once
//! - The grace timer is cancellable so no callback outlives teardown

pub mod controller;
pub mod shutdown;
pub mod signals;

pub use controller::{ServerState, StaticServer};
pub use shutdown::ShutdownSignal;
