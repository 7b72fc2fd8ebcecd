//! # Core Engine Module
//!
//! The pieces every feed server is built from.
//!
//! ## Core Components:
//!
//! - **`series_buffer`**: the bounded FIFO series buffer and the owned `Snapshot` that is
//!   serialized onto the wire.
//!
//! - **`change_detector`**: revision tracking for polled resources, so a file is only
//!   re-read when its modification time moves.
//!
//! - **`session`**: the per-connection push loop. It owns its adapter and cadence, bounds
//!   every write, and classifies how the connection ended.
//!
//! - **`server`**: the accept loop. It spawns one isolated session per client and fans the
//!   shutdown signal out to all of them.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Bounded FIFO series buffer and snapshots.
pub mod series_buffer;
/// Modification-time based change detection.
pub mod change_detector;
/// The per-connection push loop.
pub mod session;
/// WebSocket accept loop and shutdown handling.
pub mod server;

// --- Public API Re-exports ---
pub use change_detector::{ChangeDetector, Revision, RevisionMarker};
pub use series_buffer::{SeriesBuffer, SeriesPoint, Snapshot};
pub use server::{shutdown_signal, FeedServer};
pub use session::{SessionHandler, SessionSettings, SessionState};
