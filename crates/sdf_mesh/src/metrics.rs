//! Engine-agnostic build statistics.
//!
//! Feature-gated and runtime-toggled so disabled collection costs one branch.
//!
//! # Usage
//!
//! ```ignore
//! use sdf_mesh::metrics::{PipelineMetrics, COLLECT_METRICS};
//!
//! // Compile with --features metrics
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! // Read after a tick:
//! let avg = system.metrics().avg_extract_us();
//! ```

use std::collections::VecDeque;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;
use std::sync::atomic::AtomicBool;

/// Runtime toggle for metrics collection.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Whether metrics are collected (compile-time feature and runtime toggle).
#[inline]
pub fn is_enabled() -> bool {
    #[cfg(feature = "metrics")]
    {
        COLLECT_METRICS.load(Ordering::Relaxed)
    }
    #[cfg(not(feature = "metrics"))]
    {
        false
    }
}

/// Fixed-capacity window over the most recent values.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a value, evicting the oldest at capacity.
    pub fn push(&mut self, value: T) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.buffer.back()
    }
}

impl<T: Copy + Default + std::ops::Add<Output = T>> RollingWindow<T> {
    pub fn sum(&self) -> T {
        self.buffer.iter().copied().fold(T::default(), |acc, x| acc + x)
    }
}

impl RollingWindow<u64> {
    pub fn average(&self) -> f64 {
        if self.buffer.is_empty() {
            0.0
        } else {
            self.sum() as f64 / self.buffer.len() as f64
        }
    }

    pub fn min_max(&self) -> Option<(u64, u64)> {
        let min = *self.buffer.iter().min()?;
        let max = *self.buffer.iter().max()?;
        Some((min, max))
    }
}

impl Default for RollingWindow<u64> {
    fn default() -> Self {
        Self::new(128) // ~2 seconds at 60fps
    }
}

/// Build pipeline statistics, updated by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    // Timing (microseconds)
    /// Worker time spent sampling, placing vertices and stitching.
    pub extract_timings: RollingWindow<u64>,
    /// Worker time spent packing working sets into meshes.
    pub finalize_timings: RollingWindow<u64>,
    /// Main-thread time per tick.
    pub tick_timings: RollingWindow<u64>,

    // Cumulative counters
    pub builds_dispatched: u64,
    pub builds_completed: u64,
    /// Completions whose object or node no longer existed.
    pub builds_orphaned: u64,
    /// Requests dropped by the per-tick budget.
    pub requests_deferred: u64,
    pub working_sets_allocated: u64,

    // Output volume
    pub vertices_built: u64,
    pub triangles_built: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear timings and counters.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_extract_timing(&mut self, timing_us: u64) {
        if is_enabled() {
            self.extract_timings.push(timing_us);
        }
    }

    pub fn record_finalize_timing(&mut self, timing_us: u64) {
        if is_enabled() {
            self.finalize_timings.push(timing_us);
        }
    }

    pub fn record_tick_timing(&mut self, timing_us: u64) {
        if is_enabled() {
            self.tick_timings.push(timing_us);
        }
    }

    /// Record one tick's dispatch outcome.
    pub fn record_dispatch(&mut self, dispatched: usize, deferred: usize) {
        if !is_enabled() {
            return;
        }
        self.builds_dispatched += dispatched as u64;
        self.requests_deferred += deferred as u64;
    }

    /// Record a handoff; `None` for orphans.
    pub fn record_completion(&mut self, mesh: Option<(usize, usize)>) {
        if !is_enabled() {
            return;
        }
        match mesh {
            Some((vertices, triangles)) => {
                self.builds_completed += 1;
                self.vertices_built += vertices as u64;
                self.triangles_built += triangles as u64;
            }
            None => self.builds_orphaned += 1,
        }
    }

    /// Mirror the pool's allocation counter.
    pub fn record_pool_allocations(&mut self, allocated: u64) {
        if is_enabled() {
            self.working_sets_allocated = allocated;
        }
    }

    pub fn avg_extract_us(&self) -> f64 {
        self.extract_timings.average()
    }

    pub fn avg_finalize_us(&self) -> f64 {
        self.finalize_timings.average()
    }

    pub fn avg_tick_us(&self) -> f64 {
        self.tick_timings.average()
    }
}
