//! Job submission and completion polling for background builds.
//!
//! `ExecutionMode::Threaded` hands work to `rayon::spawn`:
//! - Native: rayon's thread pool (std::thread based)
//! - wasm32-unknown-unknown: wasm-bindgen-rayon (Web Workers)
//! - wasm32-unknown-emscripten: rayon via pthreads (Web Workers)
//!
//! `ExecutionMode::Inline` runs the work inside `spawn` and stores the result
//! immediately. Use it on targets without worker threads, and in tests that
//! need deterministic completion.
//!
//! # Usage
//!
//! ```ignore
//! let executor = TaskExecutor::new(ExecutionMode::Threaded);
//!
//! // Queue work (non-blocking)
//! let task_id = executor.spawn(move || expensive_computation());
//!
//! // Poll for results each frame
//! if let Some(result) = executor.poll::<MyResult>(task_id) {
//!     // Use result
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Unique identifier for a spawned task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
  fn next() -> Self {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    Self(COUNTER.fetch_add(1, Ordering::Relaxed))
  }
}

/// Where spawned work runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionMode {
  /// On rayon's thread pool.
  #[default]
  Threaded,
  /// Synchronously inside `spawn`.
  Inline,
}

/// Non-blocking state of a spawned task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
  Pending,
  Signalled,
  /// Unknown id, or result already taken.
  Unknown,
}

/// Type-erased result container.
struct TaskResult {
  data: Box<dyn std::any::Any + Send>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fire-and-forget task executor with polled results.
pub struct TaskExecutor {
  mode: ExecutionMode,
  /// Completed results waiting to be polled.
  results: Arc<Mutex<HashMap<TaskId, TaskResult>>>,
  /// Currently pending task IDs.
  pending: Arc<Mutex<HashSet<TaskId>>>,
}

impl TaskExecutor {
  pub fn new(mode: ExecutionMode) -> Self {
    Self {
      mode,
      results: Arc::new(Mutex::new(HashMap::new())),
      pending: Arc::new(Mutex::new(HashSet::new())),
    }
  }

  /// Executor that runs everything inline.
  pub fn inline() -> Self {
    Self::new(ExecutionMode::Inline)
  }

  pub fn mode(&self) -> ExecutionMode {
    self.mode
  }

  /// Submit work (non-blocking in threaded mode).
  ///
  /// Returns a TaskId that can be used to poll for the result.
  pub fn spawn<F, T>(&self, work: F) -> TaskId
  where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
  {
    let task_id = TaskId::next();

    if self.mode == ExecutionMode::Inline {
      let result = work();
      lock(&self.results).insert(
        task_id,
        TaskResult {
          data: Box::new(result),
        },
      );
      return task_id;
    }

    lock(&self.pending).insert(task_id);

    let results = Arc::clone(&self.results);
    let pending = Arc::clone(&self.pending);

    rayon::spawn(move || {
      let result = work();

      // Store before clearing pending so a task is never in neither set.
      lock(&results).insert(
        task_id,
        TaskResult {
          data: Box::new(result),
        },
      );
      lock(&pending).remove(&task_id);
    });

    task_id
  }

  /// Run work without tracking a result.
  ///
  /// The work reports back on its own, typically over a channel.
  pub fn execute<F>(&self, work: F)
  where
    F: FnOnce() + Send + 'static,
  {
    match self.mode {
      ExecutionMode::Inline => work(),
      ExecutionMode::Threaded => rayon::spawn(work),
    }
  }

  /// Poll for a task's result (non-blocking).
  ///
  /// Returns `Some(result)` if the task completed, `None` if still running.
  /// Returns `None` if the task ID is invalid, already consumed, or `T` does
  /// not match the task's result type.
  pub fn poll<T: 'static>(&self, task_id: TaskId) -> Option<T> {
    let result = lock(&self.results).remove(&task_id)?;
    result.data.downcast::<T>().ok().map(|b| *b)
  }

  /// Check a task without taking its result.
  pub fn state(&self, task_id: TaskId) -> TaskState {
    if lock(&self.results).contains_key(&task_id) {
      TaskState::Signalled
    } else if lock(&self.pending).contains(&task_id) {
      TaskState::Pending
    } else {
      TaskState::Unknown
    }
  }

  /// Check if a task is still running.
  pub fn is_pending(&self, task_id: TaskId) -> bool {
    lock(&self.pending).contains(&task_id)
  }

  /// Get the number of worker threads in rayon's pool.
  pub fn num_threads(&self) -> usize {
    match self.mode {
      ExecutionMode::Threaded => rayon::current_num_threads(),
      ExecutionMode::Inline => 1,
    }
  }

  /// Get the number of tasks currently queued or running.
  pub fn pending_count(&self) -> usize {
    lock(&self.pending).len()
  }
}

impl Default for TaskExecutor {
  fn default() -> Self {
    Self::new(ExecutionMode::default())
  }
}

impl Clone for TaskExecutor {
  fn clone(&self) -> Self {
    Self {
      mode: self.mode,
      results: Arc::clone(&self.results),
      pending: Arc::clone(&self.pending),
    }
  }
}

// =============================================================================
// Tests
// =============================================================================
