//! Root bindings: where a directory tree appears in URL space.
//!
//! # Responsibilities
//! - Normalize (dir, mount) pairs at construction
//! - Rewrite absolute filesystem paths into URL paths deterministically
//!
//! # Design Decisions
//! - The source directory is canonicalized once, so watcher event paths
//!   (always under the canonical root) strip cleanly
//! - The mount prefix always carries a leading and trailing slash, which
//!   makes the rewrite injective for any path under the root
//! - No rewrite ever happens at request time; lookups are exact map hits

use std::io;
use std::path::{Path, PathBuf};

/// A normalized (source directory, mount prefix) pair.
#[derive(Debug, Clone)]
pub struct RootBinding {
    /// Canonicalized source directory; also the path handed to the watcher.
    dir: PathBuf,
    /// Mount prefix with leading and trailing `/`.
    mount: String,
}

impl RootBinding {
    /// Build a binding, canonicalizing the directory and normalizing the
    /// mount prefix. Fails if the directory cannot be resolved.
    pub fn new(dir: &Path, mount: &str) -> io::Result<Self> {
        let dir = dir.canonicalize()?;
        Ok(Self {
            dir,
            mount: normalize_mount(mount),
        })
    }

    /// The canonical source directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The normalized mount prefix.
    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// Rewrite an absolute filesystem path under this root into its URL
    /// path. Returns `None` for paths outside the root.
    pub fn server_path(&self, abs: &Path) -> Option<String> {
        let rel = abs.strip_prefix(&self.dir).ok()?;
        let rel = rel.to_string_lossy();
        #[cfg(windows)]
        let rel = rel.replace('\\', "/");
        Some(format!("{}{}", self.mount, rel))
    }
}

/// Normalize a mount prefix to carry exactly one leading and one trailing
/// slash.
pub fn normalize_mount(mount: &str) -> String {
    let trimmed = mount.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// Parent-directory URL path of a server path, with trailing slash.
/// `/a/b/index.html` → `/a/b/`.
pub fn parent_dir_path(server_path: &str) -> String {
    match server_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => server_path[..=idx].to_string(),
    }
}

/// File name component of a server path.
pub fn base_name(server_path: &str) -> &str {
    server_path
        .rfind('/')
        .map(|idx| &server_path[idx + 1..])
        .unwrap_or(server_path)
}
