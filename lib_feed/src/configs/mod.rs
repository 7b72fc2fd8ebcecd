//! # Configuration Modules
//!
//! Layered server configuration: built-in defaults, an optional JSON file, then
//! environment variables and command line flags.

/// Feed server settings and their loaders.
pub mod feed_config;

pub use feed_config::{load_config, load_config_from, ConfigNotice, FeedArgs, FeedConfig, FeedKind};
