//! # Feed Errors
//!
//! A single error type shared by the buffers, source adapters and WebSocket sessions.
//!
//! Every variant is local to one session or one poll tick. The server never terminates
//! because of a `FeedError` raised inside a session; the only errors that reach `main`
//! are configuration, logging and bind failures at startup.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout `lib_feed`.
pub type FeedResult<T> = Result<T, FeedError>;

#[derive(Debug, Error)]
pub enum FeedError {
    /// The watched resource is missing or cannot be read at poll time.
    /// Recovered locally: the tick is skipped and retried on the next one.
    #[error("Resource unavailable: {path}")]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A single record could not be parsed. The record is skipped, the rest of the read goes on.
    #[error("Malformed record on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// The client closed the connection (close frame, end of stream or broken pipe).
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Any other failure while sending to or receiving from the client.
    #[error("Transport error: {0}")]
    Transport(#[source] axum::Error),

    /// The source adapter failed in a way a skipped tick cannot recover from.
    #[error("Source adapter failed: {0}")]
    Source(String),

    /// A frame could not be written within the configured write timeout.
    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("Failed to serialize frame: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error occurred: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

impl FeedError {
    /// Classifies a WebSocket transport failure.
    ///
    /// Broken pipes and resets mean the client went away, which is an expected end of a
    /// session rather than a fault.
    pub fn from_transport(err: axum::Error) -> Self {
        let mut cause: Option<&(dyn StdError + 'static)> = Some(&err);
        while let Some(current) = cause {
            if let Some(io_err) = current.downcast_ref::<io::Error>() {
                if matches!(
                    io_err.kind(),
                    io::ErrorKind::BrokenPipe
                        | io::ErrorKind::ConnectionReset
                        | io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::UnexpectedEof
                ) {
                    return FeedError::ConnectionClosed;
                }
            }
            cause = current.source();
        }
        FeedError::Transport(err)
    }

    /// `true` for the ways a session is expected to end when a client simply leaves.
    pub fn is_expected_disconnect(&self) -> bool {
        matches!(self, FeedError::ConnectionClosed)
    }

    /// `true` for errors that only cost the current poll tick or record.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FeedError::ResourceUnavailable { .. } | FeedError::Parse { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_pipe_is_a_disconnect() {
        let err = axum::Error::new(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        let classified = FeedError::from_transport(err);
        assert!(classified.is_expected_disconnect());
    }

    #[test]
    fn other_transport_failures_stay_transport_errors() {
        let err = axum::Error::new(io::Error::new(io::ErrorKind::Other, "tls alert"));
        let classified = FeedError::from_transport(err);
        assert!(matches!(classified, FeedError::Transport(_)));
        assert!(!classified.is_expected_disconnect());
    }

    #[test]
    fn recoverable_kinds() {
        let parse = FeedError::Parse {
            line: 3,
            reason: "bad value".to_string(),
        };
        assert!(parse.is_recoverable());
        assert!(!FeedError::ConnectionClosed.is_recoverable());
        assert!(!FeedError::WriteTimeout(Duration::from_secs(1)).is_recoverable());
        assert!(!FeedError::Source("feed went away".to_string()).is_recoverable());
    }
}
