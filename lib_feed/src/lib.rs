//! Building blocks of the real-time series feed servers: bounded series buffers, source
//! adapters (synthetic and file polling), per-connection push sessions and the WebSocket
//! server that hosts them.

pub mod configs;
pub mod core;
pub mod errors;
pub mod ingestors;
pub mod loggers;

// Re-export the everyday types
pub use configs::{load_config, FeedConfig, FeedKind};
pub use self::core::{FeedServer, SeriesBuffer, SeriesPoint, Snapshot};
pub use errors::{FeedError, FeedResult};
pub use ingestors::{AdapterFactory, FilePollingAdapter, PolledResource, SourceAdapter, SyntheticAdapter};
pub use loggers::setup_logging;
