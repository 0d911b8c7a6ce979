//! The served-path → file mapping.
//!
//! # Responsibilities
//! - Hold exactly one [`FileEntry`] per normalized URL path
//! - Register index files under their directory alias as well
//! - Serve lock-free reads to the dispatcher while watcher events mutate
//!
//! # Design Decisions
//! - `DashMap` guards the map across the multi-threaded runtime; watcher
//!   apply tasks write, request handlers only read
//! - Entries are immutable and `Arc`-shared: a change replaces the entry
//!   wholesale, and in-flight requests keep streaming the one they captured
//! - Last write wins for colliding keys (including across roots)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::routing::mount::{base_name, parent_dir_path};

/// Metadata for one served file. Immutable once constructed.
#[derive(Debug)]
pub struct FileEntry {
    /// Absolute path to stream the body from.
    pub abs_path: PathBuf,
    /// Content type derived from the file extension.
    pub content_type: String,
    /// Source mtime in milliseconds; the cache validator.
    pub modified_ms: u64,
}

impl FileEntry {
    pub fn new(abs_path: PathBuf, modified_ms: u64) -> Self {
        let content_type = mime_guess::from_path(&abs_path)
            .first_or_octet_stream()
            .to_string();
        Self {
            abs_path,
            content_type,
            modified_ms,
        }
    }

    /// Cache validator: lowercase hex of the modification time.
    pub fn etag(&self) -> String {
        format!("{:x}", self.modified_ms)
    }
}

/// Mapping from URL path to file entry, mutated only by watch events.
pub struct RouteTable {
    entries: DashMap<String, Arc<FileEntry>>,
    index_files: Vec<String>,
}

impl RouteTable {
    pub fn new(index_files: Vec<String>) -> Self {
        Self {
            entries: DashMap::new(),
            index_files,
        }
    }

    /// Look up the entry for a request path, capturing a reference the
    /// caller keeps for the rest of the request.
    pub fn get(&self, server_path: &str) -> Option<Arc<FileEntry>> {
        self.entries.get(server_path).map(|e| Arc::clone(&e))
    }

    /// Register (or replace) the entry for a server path. Index files are
    /// additionally registered under their parent directory's path.
    pub fn upsert(&self, server_path: String, abs_path: &Path, modified_ms: u64) {
        let entry = Arc::new(FileEntry::new(abs_path.to_path_buf(), modified_ms));
        tracing::debug!(path = %server_path, file = %abs_path.display(), "route registered");

        if self.is_index(&server_path) {
            let alias = parent_dir_path(&server_path);
            tracing::debug!(path = %alias, file = %abs_path.display(), "directory alias registered");
            self.entries.insert(alias, Arc::clone(&entry));
        }
        self.entries.insert(server_path, entry);
    }

    /// Drop the entry for a server path; the directory alias goes with it
    /// when it still points at the removed entry. A path that was never a
    /// registered file is treated as a removed directory, and everything
    /// keyed beneath it is purged.
    pub fn remove(&self, server_path: &str) {
        let removed = self.entries.remove(server_path).map(|(_, e)| e);
        tracing::debug!(path = %server_path, "route removed");

        if let Some(removed) = removed {
            if self.is_index(server_path) {
                let alias = parent_dir_path(server_path);
                self.entries
                    .remove_if(&alias, |_, current| Arc::ptr_eq(current, &removed));
            }
        } else {
            // A directory that left the tree arrives as one event for the
            // directory path; its descendants were keyed individually.
            let prefix = format!("{}/", server_path.trim_end_matches('/'));
            self.entries.retain(|key, _| !key.starts_with(&prefix));
        }
    }

    /// Number of registered paths (aliases included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_index(&self, server_path: &str) -> bool {
        let name = base_name(server_path);
        self.index_files.iter().any(|idx| idx == name)
    }
}
