//! # Synthetic Generator
//!
//! Produces one point per series per tick from a fixed formula of the time elapsed since
//! the adapter was created:
//!
//! - `cpu    = 50 + 30 * sin(t / 2)`
//! - `memory = 60 + 20 * cos(t / 3)`
//! - `disk   = 40 + 15 * sin(t / 5)`
//!
//! Each connection owns its own adapter, so two clients connected at different times see
//! different phases of the curves and independently filling buffers.

use std::time::Instant;

use chrono::Utc;

use crate::core::series_buffer::{SeriesBuffer, SeriesPoint, Snapshot};
use crate::errors::FeedResult;
use crate::ingestors::SourceAdapter;

pub const CPU_SERIES: &str = "cpu";
pub const MEMORY_SERIES: &str = "memory";
pub const DISK_SERIES: &str = "disk";

/// The generator formula as a pure function of elapsed seconds: `(cpu, memory, disk)`.
pub fn synthetic_values(elapsed_seconds: f64) -> (f64, f64, f64) {
    let cpu = 50.0 + 30.0 * (elapsed_seconds / 2.0).sin();
    let memory = 60.0 + 20.0 * (elapsed_seconds / 3.0).cos();
    let disk = 40.0 + 15.0 * (elapsed_seconds / 5.0).sin();
    (cpu, memory, disk)
}

pub struct SyntheticAdapter {
    started: Instant,
    cpu: SeriesBuffer,
    memory: SeriesBuffer,
    disk: SeriesBuffer,
}

impl SyntheticAdapter {
    pub fn new(max_points: usize) -> Self {
        Self {
            started: Instant::now(),
            cpu: SeriesBuffer::new(CPU_SERIES, max_points),
            memory: SeriesBuffer::new(MEMORY_SERIES, max_points),
            disk: SeriesBuffer::new(DISK_SERIES, max_points),
        }
    }

    /// Appends one point per series for the given clock readings and returns the full state.
    pub fn tick_at(&mut self, elapsed_seconds: f64, timestamp_ms: i64) -> Snapshot {
        let (cpu, memory, disk) = synthetic_values(elapsed_seconds);
        self.cpu.append(SeriesPoint::new(timestamp_ms, cpu));
        self.memory.append(SeriesPoint::new(timestamp_ms, memory));
        self.disk.append(SeriesPoint::new(timestamp_ms, disk));

        let mut snapshot = Snapshot::new();
        snapshot.capture(&self.cpu);
        snapshot.capture(&self.memory);
        snapshot.capture(&self.disk);
        snapshot
    }
}

impl SourceAdapter for SyntheticAdapter {
    async fn produce_snapshot(&mut self) -> FeedResult<Option<Snapshot>> {
        let elapsed = self.started.elapsed().as_secs_f64();
        let now_ms = Utc::now().timestamp_millis();
        Ok(Some(self.tick_at(elapsed, now_ms)))
    }
}
