//! # File Polling Ingestor
//!
//! Watches a single file and republishes it as one series whenever its content changes.
//!
//! ## Poll Tick:
//! 1. **Probe**: read the file's modification time. A missing file skips the tick silently;
//!    it is retried on every following tick.
//! 2. **Compare**: an unchanged marker skips the tick.
//! 3. **Re-read**: a changed marker triggers a full re-read and re-parse. The marker is
//!    recorded, and a push is signalled only if the parsed rows are non-empty and differ
//!    from the rows last pushed by this adapter.
//!
//! The series is named after the file stem (`/data/cpu_temp.csv` → `cpu_temp`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::core::change_detector::{ChangeDetector, Revision};
use crate::core::series_buffer::{SeriesPoint, Snapshot};
use crate::errors::{FeedError, FeedResult};
use crate::ingestors::records::parse_rows;
use crate::ingestors::SourceAdapter;

/// The watched file and the measurement name derived from it. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PolledResource {
    inner: Arc<ResourceInner>,
}

#[derive(Debug)]
struct ResourceInner {
    path: PathBuf,
    measurement: String,
}

impl PolledResource {
    /// Fails with `FeedError::Config` when no measurement name can be derived from `path`.
    pub fn new(path: impl Into<PathBuf>) -> FeedResult<Self> {
        let path = path.into();
        let measurement = measurement_name(&path)?;
        Ok(Self {
            inner: Arc::new(ResourceInner { path, measurement }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn measurement(&self) -> &str {
        &self.inner.measurement
    }
}

/// Base name of `path` with its extension stripped.
pub fn measurement_name(path: &Path) -> FeedResult<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| {
            FeedError::Config(format!(
                "cannot derive a measurement name from '{}'",
                path.display()
            ))
        })
}

pub struct FilePollingAdapter {
    resource: PolledResource,
    max_points: usize,
    detector: ChangeDetector,
    last_pushed: Option<Vec<SeriesPoint>>,
}

impl FilePollingAdapter {
    pub fn new(resource: PolledResource, max_points: usize) -> Self {
        Self {
            resource,
            max_points,
            detector: ChangeDetector::new(),
            last_pushed: None,
        }
    }

    async fn poll(&mut self) -> FeedResult<Option<Snapshot>> {
        let path = self.resource.path();
        let marker = match self.detector.check(path).await? {
            Revision::Unchanged => return Ok(None),
            Revision::Changed(marker) => marker,
        };

        let raw = tokio::fs::read(path)
            .await
            .map_err(|source| FeedError::ResourceUnavailable {
                path: path.to_path_buf(),
                source,
            })?;
        self.detector.observe(marker);

        let points = parse_rows(&String::from_utf8_lossy(&raw), self.max_points);
        if points.is_empty() {
            debug!("{} changed but holds no valid records", path.display());
            return Ok(None);
        }
        if self.last_pushed.as_ref() == Some(&points) {
            debug!("{} touched without content changes", path.display());
            return Ok(None);
        }

        let snapshot = Snapshot::single(self.resource.measurement(), points.clone());
        self.last_pushed = Some(points);
        Ok(Some(snapshot))
    }
}

impl SourceAdapter for FilePollingAdapter {
    async fn produce_snapshot(&mut self) -> FeedResult<Option<Snapshot>> {
        match self.poll().await {
            Err(e) if e.is_recoverable() => {
                trace!("Skipping poll tick: {}", e);
                Ok(None)
            }
            other => other,
        }
    }
}
