/// Console and rolling-file `tracing` setup for the feed servers.
pub mod setup;

pub use setup::{normalize_level, setup_logging};
