//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files; the
//! same structs are the programmatic construction surface for embedders.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the static server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address. The default listens on every interface; use
    /// "127.0.0.1" to restrict to this machine.
    pub host: String,

    /// Port to listen on. When absent the system picks a free port.
    pub port: Option<u16>,

    /// Ordered list of directory trees to serve and the URL prefix each is
    /// mounted under.
    pub serve: Vec<MountConfig>,

    /// Run the shutdown sequence when a panic escapes anywhere in the
    /// process.
    pub close_on_fault: bool,

    /// Run the shutdown sequence on Ctrl-C.
    pub close_on_interrupt: bool,

    /// Emit startup/shutdown and per-request access records.
    pub verbose: bool,

    /// Emit per-event route table updates.
    pub debug: bool,

    /// File names that are additionally registered under their parent
    /// directory's path.
    pub index_files: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: None,
            serve: Vec::new(),
            close_on_fault: true,
            close_on_interrupt: true,
            verbose: true,
            debug: false,
            index_files: vec!["index.html".to_string()],
        }
    }
}

/// One directory tree exposed under a URL prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MountConfig {
    /// Source directory on disk.
    pub dir: PathBuf,

    /// URL prefix the directory's contents are reachable under.
    #[serde(rename = "as", default = "default_mount")]
    pub mount: String,
}

fn default_mount() -> String {
    "/".to_string()
}

impl MountConfig {
    /// Convenience constructor for programmatic use.
    pub fn new(dir: impl Into<PathBuf>, mount: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            mount: mount.into(),
        }
    }
}
