//! Build scheduler: turns per-tick update requests into bounded background
//! extraction jobs and feeds finished meshes back exactly once.
//!
//! ```text
//!  main thread                        workers                      main thread
//! ┌───────────────┐  spawn   ┌──────────────┐ poll  ┌──────────┐ channel ┌─────────┐
//! │ sort + budget ├─────────►│   Extract    ├──────►│ Finalize ├────────►│ Handoff │
//! │ signal build  │          │ working set  │       │ MeshOutput│        │ release │
//! └───────────────┘          └──────────────┘       └──────────┘         └─────────┘
//!         │ main-thread-only field
//!         └──── extract + finalize inline ─────────────────────────────────►
//! ```
//!
//! A request is either dispatched this tick or dropped; dropped nodes stay
//! stale and come back on the next traversal. The caller marks a node as
//! building inside [`BuildScheduler::dispatch`] before any work is submitted,
//! so a node never has two builds in flight.

pub mod priority;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use glam::UVec3;
use web_time::Instant;

use crate::extract::{self, ExtractRegion, ExtractStats};
use crate::field::FieldHandle;
use crate::metrics::PipelineMetrics;
use crate::octree::{Aabb, NodeId};
use crate::system::ObjectId;
use crate::threading::{ExecutionMode, TaskExecutor, TaskId};
use crate::types::{ExtractConfig, MeshOutput};
use crate::working_set::{WorkingSet, WorkingSetPool};

pub use priority::{sort_by_priority, PriorityKey};

// =============================================================================
// Configuration
// =============================================================================

/// Scheduler limits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerConfig {
  /// New builds started per tick.
  pub max_compute_per_frame: usize,
  /// Depth below which coarser requests always sort first.
  pub lod_precedence: u32,
  /// Idle working sets kept for reuse.
  pub max_cached_working_sets: usize,
  /// How long [`BuildScheduler::shutdown`] waits for in-flight builds.
  pub shutdown_timeout: Duration,
}

impl SchedulerConfig {
  pub const DEFAULT: Self = Self {
    max_compute_per_frame: 8,
    lod_precedence: 2,
    max_cached_working_sets: 16,
    shutdown_timeout: Duration::from_secs(5),
  };

  /// No per-tick budget.
  pub const UNLIMITED: Self = Self {
    max_compute_per_frame: usize::MAX,
    ..Self::DEFAULT
  };

  pub fn with_max_compute_per_frame(mut self, max: usize) -> Self {
    self.max_compute_per_frame = max;
    self
  }

  pub fn with_lod_precedence(mut self, depth: u32) -> Self {
    self.lod_precedence = depth;
    self
  }

  pub fn with_max_cached_working_sets(mut self, max: usize) -> Self {
    self.max_cached_working_sets = max;
    self
  }

  pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
    self.shutdown_timeout = timeout;
    self
  }
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

// =============================================================================
// Requests and results
// =============================================================================

/// Identifies one node of one object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BuildKey {
  pub owner: ObjectId,
  pub node: NodeId,
}

/// Everything a build needs, gathered on the main thread.
#[derive(Clone, Debug)]
pub struct BuildRequest {
  pub key: BuildKey,
  pub bounds: Aabb,
  pub depth: u32,
  /// World-space viewer distance used for ordering, comparable across objects.
  pub distance: f32,
  pub resolution: UVec3,
  pub config: ExtractConfig,
  pub field: FieldHandle,
}

/// Per-tick counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
  pub requested: usize,
  pub dispatched: usize,
  /// Requests dropped by the budget, or rejected by the caller.
  pub deferred: usize,
  pub completed: usize,
  pub orphaned: usize,
  /// Builds between dispatch and handoff after this tick.
  pub in_flight: usize,
}

/// Extraction stage output, produced on a worker.
struct Extracted {
  set: WorkingSet,
  outcome: crate::Result<ExtractStats>,
  elapsed_us: u64,
}

/// Finalize stage output, sent to the main thread.
struct Finished {
  key: BuildKey,
  set: WorkingSet,
  mesh: Option<MeshOutput>,
  extract_us: u64,
  finalize_us: u64,
}

struct Extracting {
  key: BuildKey,
  task: TaskId,
  flat_shading: bool,
}

// =============================================================================
// Scheduler
// =============================================================================

pub struct BuildScheduler {
  config: SchedulerConfig,
  executor: TaskExecutor,
  pool: Arc<WorkingSetPool>,
  extracting: Vec<Extracting>,
  in_flight: HashSet<BuildKey>,
  finished_tx: Sender<Finished>,
  finished_rx: Receiver<Finished>,
  metrics: PipelineMetrics,
}

impl BuildScheduler {
  pub fn new(config: SchedulerConfig) -> Self {
    Self::with_executor(config, TaskExecutor::default())
  }

  /// Scheduler running every stage synchronously.
  pub fn inline(config: SchedulerConfig) -> Self {
    Self::with_executor(config, TaskExecutor::inline())
  }

  pub fn with_executor(config: SchedulerConfig, executor: TaskExecutor) -> Self {
    let (finished_tx, finished_rx) = crossbeam_channel::unbounded();
    Self {
      config,
      executor,
      pool: Arc::new(WorkingSetPool::new(config.max_cached_working_sets)),
      extracting: Vec::new(),
      in_flight: HashSet::new(),
      finished_tx,
      finished_rx,
      metrics: PipelineMetrics::new(),
    }
  }

  pub fn config(&self) -> &SchedulerConfig {
    &self.config
  }

  pub fn execution_mode(&self) -> ExecutionMode {
    self.executor.mode()
  }

  pub fn pool(&self) -> &WorkingSetPool {
    &self.pool
  }

  pub fn metrics(&self) -> &PipelineMetrics {
    &self.metrics
  }

  pub fn metrics_mut(&mut self) -> &mut PipelineMetrics {
    &mut self.metrics
  }

  /// Number of builds between dispatch and handoff.
  pub fn in_flight_count(&self) -> usize {
    self.in_flight.len()
  }

  pub fn is_in_flight(&self, key: BuildKey) -> bool {
    self.in_flight.contains(&key)
  }

  // ===========================================================================
  // Dispatch
  // ===========================================================================

  /// Order `requests`, start up to the per-tick budget and drop the rest.
  ///
  /// `signal_building` runs on this thread for each request about to start,
  /// before any work is submitted. It returns false when the node is gone,
  /// in which case the request is skipped.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "scheduler_dispatch"))]
  pub fn dispatch<S>(&mut self, mut requests: Vec<BuildRequest>, mut signal_building: S, stats: &mut TickStats)
  where
    S: FnMut(BuildKey) -> bool,
  {
    stats.requested += requests.len();
    sort_by_priority(&mut requests, self.config.lod_precedence, |r| (r.depth, r.distance));

    let mut dispatched = 0;
    for request in requests.iter() {
      if dispatched >= self.config.max_compute_per_frame {
        break;
      }
      let duplicate = self.in_flight.contains(&request.key);
      debug_assert!(!duplicate, "{:?} requested while in flight", request.key);
      if duplicate {
        continue;
      }
      let region = ExtractRegion::from_bounds(&request.bounds, request.resolution);
      debug_assert!(region.is_ok(), "unbuildable request {:?}: {region:?}", request.key);
      let region = match region {
        Ok(region) => region,
        Err(err) => {
          log::error!("skipping build for {:?}: {err}", request.key);
          continue;
        }
      };
      if !signal_building(request.key) {
        continue;
      }

      self.in_flight.insert(request.key);
      self.start(request, region);
      dispatched += 1;
      log::trace!(
        "dispatched {:?} depth {} at distance {:.2}",
        request.key,
        request.depth,
        request.distance
      );
    }

    let deferred = requests.len() - dispatched;
    if deferred > 0 {
      log::debug!("deferred {deferred} of {} build requests", requests.len());
    }
    stats.dispatched += dispatched;
    stats.deferred += deferred;
    stats.in_flight = self.in_flight.len();
    self.metrics.record_dispatch(dispatched, deferred);
    self.metrics.record_pool_allocations(self.pool.stats().allocated);
  }

  fn start(&mut self, request: &BuildRequest, region: ExtractRegion) {
    let mut set = self.pool.acquire(region.grid_dims(request.config.margin));
    let config = request.config;

    match &request.field {
      FieldHandle::ThreadSafe(field) => {
        let field = Arc::clone(field);
        let task = self.executor.spawn(move || {
          let start = Instant::now();
          let outcome = extract::extract_into(field.as_ref(), &region, &config, &mut set.scratch, &mut ());
          Extracted {
            set,
            outcome,
            elapsed_us: start.elapsed().as_micros() as u64,
          }
        });
        self.extracting.push(Extracting {
          key: request.key,
          task,
          flat_shading: config.flat_shading,
        });
      }
      FieldHandle::MainThreadOnly(field) => {
        let start = Instant::now();
        let outcome = extract::extract_into(field.as_ref(), &region, &config, &mut set.scratch, &mut ());
        let extracted = Extracted {
          set,
          outcome,
          elapsed_us: start.elapsed().as_micros() as u64,
        };
        finalize_build(request.key, config.flat_shading, extracted, &self.finished_tx);
      }
    }
  }

  // ===========================================================================
  // Completion
  // ===========================================================================

  /// Advance in-flight builds and hand finished meshes to `handoff`.
  ///
  /// Finished extractions move on to finalize; finalized meshes arrive in
  /// completion order. `handoff` receives `None` for regions without a
  /// surface and returns false when the target no longer exists, which
  /// discards the result.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "scheduler_poll"))]
  pub fn poll<H>(&mut self, mut handoff: H, stats: &mut TickStats)
  where
    H: FnMut(BuildKey, Option<MeshOutput>) -> bool,
  {
    let mut i = 0;
    while i < self.extracting.len() {
      match self.executor.poll::<Extracted>(self.extracting[i].task) {
        Some(extracted) => {
          let job = self.extracting.swap_remove(i);
          let tx = self.finished_tx.clone();
          self
            .executor
            .execute(move || finalize_build(job.key, job.flat_shading, extracted, &tx));
        }
        None => i += 1,
      }
    }

    while let Ok(finished) = self.finished_rx.try_recv() {
      self.in_flight.remove(&finished.key);
      self.metrics.record_extract_timing(finished.extract_us);
      self.metrics.record_finalize_timing(finished.finalize_us);

      let counts = finished
        .mesh
        .as_ref()
        .map_or((0, 0), |m| (m.vertices.len(), m.triangle_count()));
      if handoff(finished.key, finished.mesh) {
        stats.completed += 1;
        self.metrics.record_completion(Some(counts));
      } else {
        stats.orphaned += 1;
        self.metrics.record_completion(None);
        log::debug!("discarded orphaned build for {:?}", finished.key);
      }
      self.pool.release(finished.set);
    }

    stats.in_flight = self.in_flight.len();
  }

  /// Wait for in-flight builds, discarding their results, then empty the pool.
  ///
  /// Returns false if builds were still running when the timeout expired.
  pub fn shutdown(&mut self) -> bool {
    let deadline = Instant::now() + self.config.shutdown_timeout;
    let mut stats = TickStats::default();
    loop {
      self.poll(|_, _| false, &mut stats);
      if self.in_flight.is_empty() {
        break;
      }
      if Instant::now() >= deadline {
        log::warn!(
          "shutdown timed out with {} builds in flight",
          self.in_flight.len()
        );
        self.pool.clear();
        return false;
      }
      std::thread::yield_now();
    }
    self.pool.clear();
    true
  }
}

/// Pack a finished extraction and send it to the main thread.
fn finalize_build(key: BuildKey, flat_shading: bool, extracted: Extracted, tx: &Sender<Finished>) {
  let start = Instant::now();
  let Extracted {
    set,
    outcome,
    elapsed_us,
  } = extracted;

  let mesh = match outcome {
    Ok(_) => {
      let mesh = extract::finalize(&set.scratch.vertices, &set.scratch.indices, flat_shading);
      (!mesh.is_empty()).then_some(mesh)
    }
    Err(err) => {
      log::error!("extraction failed for {key:?}: {err}");
      None
    }
  };

  // The receiver only goes away with the scheduler.
  tx.send(Finished {
    key,
    set,
    mesh,
    extract_us: elapsed_us,
    finalize_us: start.elapsed().as_micros() as u64,
  })
  .ok();
}
