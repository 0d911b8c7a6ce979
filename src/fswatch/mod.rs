//! Filesystem watching subsystem.
//!
//! # Data Flow
//! ```text
//! notify backend (inotify/kqueue/...)
//!     → root.rs callback (stat, translate to upsert/remove)
//!     → unbounded mpsc channel
//!     → apply task (rewrite path via the root binding, mutate RouteTable)
//! ```
//!
//! # Design Decisions
//! - One watcher and one apply task per root: per-root emission order is
//!   preserved, cross-root order is not promised
//! - The route table never consults the filesystem at request time; this
//!   subsystem is the only writer
//! - An initial recursive scan stands in for the event replay the notify
//!   backend does not provide

pub mod root;

pub use root::WatchedRoot;
