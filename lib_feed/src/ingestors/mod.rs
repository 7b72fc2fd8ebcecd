//! # Data Ingestors Module
//!
//! Producers of series data for the push sessions. Every ingestor implements
//! `SourceAdapter`, so a session drives a synthetic generator and a file poller through
//! the same loop.
//!
//! ## Contained Modules:
//! - **`synthetic`**: a clock-driven generator of `cpu`, `memory` and `disk` series.
//! - **`file_polling`**: watches one file and re-publishes it when its content changes.
//! - **`records`**: row parsing for the file poller.
//!
//! Adapters are created per connection through an `AdapterFactory`, which keeps all
//! mutable buffer state private to one session.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use std::future::Future;

use crate::core::series_buffer::Snapshot;
use crate::errors::FeedResult;

/// Self-scheduling synthetic generator.
pub mod synthetic;
/// File-backed poller with change detection.
pub mod file_polling;
/// Two-field record parsing for polled resources.
pub mod records;

// --- Public API Re-exports ---
pub use file_polling::{FilePollingAdapter, PolledResource};
pub use synthetic::{synthetic_values, SyntheticAdapter};

/// # Source Adapter
///
/// A producer invoked once per session tick.
///
/// `Ok(Some(snapshot))` asks the session to push `snapshot`; `Ok(None)` means nothing new
/// this tick. An `Err` ends the session.
pub trait SourceAdapter: Send + 'static {
    fn produce_snapshot(&mut self) -> impl Future<Output = FeedResult<Option<Snapshot>>> + Send;
}

/// Builds one fresh adapter per accepted connection.
pub trait AdapterFactory: Send + Sync + 'static {
    type Adapter: SourceAdapter;

    fn create(&self) -> Self::Adapter;
}

impl<F, A> AdapterFactory for F
where
    F: Fn() -> A + Send + Sync + 'static,
    A: SourceAdapter,
{
    type Adapter = A;

    fn create(&self) -> A {
        self()
    }
}
