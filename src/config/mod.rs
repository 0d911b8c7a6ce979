//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or programmatic ServerConfig
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → consumed by the lifecycle controller at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a server is constructed
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Root directory existence is re-checked at startup, since it is a
//!   runtime precondition and not only a config-file property

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{MountConfig, ServerConfig};
