//! Configuration validation.
//!
//! Semantic checks on top of what serde guarantees syntactically. Returns
//! every problem found, not just the first, so a bad config can be fixed in
//! one pass. Overlapping mount prefixes across roots are deliberately not
//! rejected; colliding keys resolve last-write-wins at runtime.

use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("host {0:?} is not a valid IP address")]
    InvalidHost(String),

    #[error("serve entry {index}: dir must not be empty")]
    EmptyDir { index: usize },

    #[error("serve entry {index}: {path} does not exist or is not a directory")]
    NotADirectory { index: usize, path: String },

    #[error("index file name {0:?} must not contain a path separator")]
    InvalidIndexName(String),
}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidHost(config.host.clone()));
    }

    for (index, mount) in config.serve.iter().enumerate() {
        if mount.dir.as_os_str().is_empty() {
            errors.push(ValidationError::EmptyDir { index });
        } else if !mount.dir.is_dir() {
            errors.push(ValidationError::NotADirectory {
                index,
                path: mount.dir.display().to_string(),
            });
        }
    }

    for name in &config.index_files {
        if name.contains('/') || name.contains('\\') {
            errors.push(ValidationError::InvalidIndexName(name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
