//! # Change Detector
//!
//! Tracks the last observed revision of an external resource so a poller can tell,
//! cheaply, whether the resource may have changed since the previous tick.
//!
//! The revision marker is the file's modification time. A changed marker only means
//! "worth re-reading"; deciding whether the content really changed is up to the caller.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::errors::{FeedError, FeedResult};

/// Opaque, comparable revision of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RevisionMarker(SystemTime);

impl RevisionMarker {
    pub fn from_modified(modified: SystemTime) -> Self {
        Self(modified)
    }
}

/// Outcome of comparing a freshly probed marker against the last observed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revision {
    Unchanged,
    Changed(RevisionMarker),
}

#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_seen: Option<RevisionMarker>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the current marker of `path`.
    ///
    /// A missing or unreadable resource is reported as `FeedError::ResourceUnavailable`.
    pub async fn probe(path: &Path) -> FeedResult<RevisionMarker> {
        let unavailable = |source| FeedError::ResourceUnavailable {
            path: PathBuf::from(path),
            source,
        };
        let metadata = tokio::fs::metadata(path).await.map_err(unavailable)?;
        let modified = metadata.modified().map_err(unavailable)?;
        Ok(RevisionMarker::from_modified(modified))
    }

    /// Compares `marker` with the last observed one without recording it.
    pub fn compare(&self, marker: RevisionMarker) -> Revision {
        match self.last_seen {
            Some(seen) if seen == marker => Revision::Unchanged,
            _ => Revision::Changed(marker),
        }
    }

    /// Probes `path` and compares the result.
    pub async fn check(&self, path: &Path) -> FeedResult<Revision> {
        let marker = Self::probe(path).await?;
        Ok(self.compare(marker))
    }

    /// Records `marker` as seen. Called once the resource has actually been re-read.
    pub fn observe(&mut self, marker: RevisionMarker) {
        self.last_seen = Some(marker);
    }

    pub fn last_seen(&self) -> Option<RevisionMarker> {
        self.last_seen
    }
}
