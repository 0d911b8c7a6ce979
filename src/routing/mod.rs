//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Watcher event (abs path, mtime)
//!     → mount.rs (rewrite abs path → URL path under the mount prefix)
//!     → table.rs (upsert/remove entry, maintain index aliases)
//!
//! Incoming request path
//!     → table.rs (exact map lookup, no filesystem access)
//!     → Arc<FileEntry> captured for the rest of the request
//! ```
//!
//! # Design Decisions
//! - Only registered paths are reachable: path traversal is structurally
//!   impossible because lookups never touch the filesystem
//! - Deterministic rewrite: bindings are normalized once at startup
//! - Last write wins for colliding keys; no cross-root ordering guarantee

pub mod mount;
pub mod table;

pub use mount::RootBinding;
pub use table::{FileEntry, RouteTable};
