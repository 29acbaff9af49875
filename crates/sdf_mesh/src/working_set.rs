//! Reusable scratch buffers for in-flight builds.
//!
//! ```text
//!   acquire(dims) ──► idle set with capacity >= dims?  ── yes ──► reuse
//!                                    │
//!                                    no ──► allocate, each axis rounded up
//!                                           to a power of two
//!
//!   release(set)  ──► idle.len() < max_cached?  ── yes ──► keep
//!                                    │
//!                                    no ──► drop
//! ```
//!
//! A working set is owned by exactly one build at a time: it is moved into
//! the build on acquire and moved back on release. Only the idle list is
//! shared, behind a mutex.

use std::sync::{Mutex, PoisonError};

use glam::UVec3;

use crate::extract::{DenseCellMap, ExtractScratch};
use crate::field::Sample;

/// Scratch bundle sized for one grid.
#[derive(Debug)]
pub struct WorkingSet {
  capacity: UVec3,
  /// Density volume, vertex buffer, index buffer and cell lookup.
  pub scratch: ExtractScratch<DenseCellMap>,
}

impl WorkingSet {
  /// Allocate buffers for grids up to `dims` rounded up to powers of two.
  pub fn new(dims: UVec3) -> Self {
    let capacity = round_up_pow2(dims);
    let points = capacity.x as usize * capacity.y as usize * capacity.z as usize;
    Self {
      capacity,
      scratch: ExtractScratch {
        samples: Vec::<Sample>::with_capacity(points),
        vertices: Vec::new(),
        indices: Vec::new(),
        cells: DenseCellMap::with_capacity(points),
      },
    }
  }

  /// Largest grid this set holds without reallocating.
  pub fn capacity(&self) -> UVec3 {
    self.capacity
  }

  /// Whether a grid of `dims` points fits.
  #[inline]
  pub fn fits(&self, dims: UVec3) -> bool {
    dims.cmple(self.capacity).all()
  }

  /// Running vertex counter of the current pass.
  pub fn vertex_count(&self) -> usize {
    self.scratch.vertices.len()
  }

  /// Running index counter of the current pass.
  pub fn index_count(&self) -> usize {
    self.scratch.indices.len()
  }

  /// Reset counters, keeping allocations.
  pub fn reset(&mut self) {
    self.scratch.samples.clear();
    self.scratch.vertices.clear();
    self.scratch.indices.clear();
  }
}

fn round_up_pow2(dims: UVec3) -> UVec3 {
  UVec3::new(
    dims.x.max(1).next_power_of_two(),
    dims.y.max(1).next_power_of_two(),
    dims.z.max(1).next_power_of_two(),
  )
}

/// Counters describing pool behaviour since creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
  pub allocated: u64,
  pub reused: u64,
  pub discarded: u64,
}

#[derive(Debug, Default)]
struct PoolInner {
  idle: Vec<WorkingSet>,
  stats: PoolStats,
}

/// Bounded pool of idle working sets.
#[derive(Debug)]
pub struct WorkingSetPool {
  inner: Mutex<PoolInner>,
  max_cached: usize,
}

impl WorkingSetPool {
  pub fn new(max_cached: usize) -> Self {
    Self {
      inner: Mutex::new(PoolInner::default()),
      max_cached,
    }
  }

  /// Take a set able to hold `dims` grid points, allocating if none is idle.
  pub fn acquire(&self, dims: UVec3) -> WorkingSet {
    let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(pos) = inner.idle.iter().position(|set| set.fits(dims)) {
      inner.stats.reused += 1;
      let mut set = inner.idle.swap_remove(pos);
      set.reset();
      return set;
    }

    inner.stats.allocated += 1;
    drop(inner);
    let set = WorkingSet::new(dims);
    log::debug!("allocated working set {} for grid {}", set.capacity(), dims);
    set
  }

  /// Return a set to the pool; dropped when the pool is full.
  pub fn release(&self, set: WorkingSet) {
    let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
    if inner.idle.len() < self.max_cached {
      inner.idle.push(set);
    } else {
      inner.stats.discarded += 1;
      log::debug!("pool full, discarding working set {}", set.capacity());
    }
  }

  /// Number of idle sets.
  pub fn idle_count(&self) -> usize {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner).idle.len()
  }

  pub fn max_cached(&self) -> usize {
    self.max_cached
  }

  pub fn stats(&self) -> PoolStats {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner).stats
  }

  /// Drop every idle set.
  pub fn clear(&self) {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner).idle.clear();
  }
}

#[cfg(test)]
#[path = "working_set_test.rs"]
mod working_set_test;
