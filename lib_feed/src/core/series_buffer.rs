//! # Bounded Series Buffer
//!
//! A fixed-capacity, append-only ring of `(timestamp, value)` points for one named series,
//! plus the owned `Snapshot` that sessions serialize onto the wire.
//!
//! ## Invariants:
//! - `len() <= capacity()` at all times.
//! - Eviction is strict FIFO: every append past capacity drops exactly one point from the head.
//! - Timestamps are stored as given. They are neither sorted nor deduplicated.
//! - `snapshot()` hands out an owned copy, so a frame being written asynchronously never
//!   observes later appends.

use std::collections::VecDeque;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::errors::FeedResult;

/// One sample: milliseconds since the Unix epoch and its value.
///
/// Serialized as a two element array, `[ts_ms, value]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: i64,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

impl Serialize for SeriesPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.timestamp, self.value).serialize(serializer)
    }
}

/// A named series capped at `capacity` points.
#[derive(Debug, Clone)]
pub struct SeriesBuffer {
    name: String,
    capacity: usize,
    points: VecDeque<SeriesPoint>,
}

impl SeriesBuffer {
    /// Creates an empty buffer. `capacity` is the `max_points` bound of the series.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            // Cap the up-front allocation, large capacities grow on demand.
            points: VecDeque::with_capacity(capacity.min(4096)),
        }
    }

    /// Appends at the tail and evicts from the head while over capacity.
    pub fn append(&mut self, point: SeriesPoint) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    /// Owned copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<SeriesPoint> {
        self.points.iter().copied().collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// # Snapshot
///
/// The materialized state of every series an adapter owns, in the order the series were
/// added. Serializes to the wire frame `{"<name>": [[ts, value], ...], ...}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    series: Vec<(String, Vec<SeriesPoint>)>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot holding a single series.
    pub fn single(name: impl Into<String>, points: Vec<SeriesPoint>) -> Self {
        let mut snapshot = Self::new();
        snapshot.insert(name, points);
        snapshot
    }

    /// Adds a series, replacing an existing one with the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, points: Vec<SeriesPoint>) {
        let name = name.into();
        match self.series.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = points,
            None => self.series.push((name, points)),
        }
    }

    /// Copies the current contents of `buffer` in under its own name.
    pub fn capture(&mut self, buffer: &SeriesBuffer) {
        self.insert(buffer.name(), buffer.snapshot());
    }

    pub fn get(&self, name: &str) -> Option<&[SeriesPoint]> {
        self.series
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, points)| points.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|(name, _)| name.as_str())
    }

    /// Length of the longest series, used for progress reporting.
    pub fn points_per_series(&self) -> usize {
        self.series
            .iter()
            .map(|(_, points)| points.len())
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|(_, points)| points.is_empty())
    }

    /// Compact JSON text frame.
    pub fn to_frame(&self) -> FeedResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.series.len()))?;
        for (name, points) in &self.series {
            map.serialize_entry(name, points)?;
        }
        map.end()
    }
}
