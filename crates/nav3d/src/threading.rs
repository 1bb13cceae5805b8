//! Background task execution on rayon's pool.
//!
//! # Usage
//!
//! ```ignore
//! let executor = TaskExecutor::new();
//! let task = executor.spawn(move || builder.build(bounds));
//!
//! // later, without blocking
//! if let Some(result) = executor.poll::<Result<BuildOutput, BuildError>>(task) {
//!   // integrate
//! }
//! ```

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

/// Identifier of a spawned task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
  fn next() -> Self {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    Self(COUNTER.fetch_add(1, Ordering::Relaxed))
  }
}

type TaskResult = Box<dyn Any + Send>;

/// Lock, recovering the guard from a poisoned mutex.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fire-and-forget executor with pollable, type-erased results.
#[derive(Clone, Default)]
pub struct TaskExecutor {
  results: Arc<Mutex<HashMap<TaskId, TaskResult>>>,
  pending: Arc<Mutex<HashSet<TaskId>>>,
}

impl TaskExecutor {
  pub fn new() -> Self {
    Self::default()
  }

  /// Queue `work` on the rayon pool.
  pub fn spawn<F, T>(&self, work: F) -> TaskId
  where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
  {
    let task_id = TaskId::next();
    lock(&self.pending).insert(task_id);

    let results = Arc::clone(&self.results);
    let pending = Arc::clone(&self.pending);
    rayon::spawn(move || {
      let result = work();
      lock(&pending).remove(&task_id);
      lock(&results).insert(task_id, Box::new(result));
    });
    task_id
  }

  /// Take a finished task's result. `None` while running or when already
  /// taken. Asking for the wrong `T` logs a warning and leaves the result in
  /// place.
  pub fn poll<T: 'static>(&self, task_id: TaskId) -> Option<T> {
    let mut results = lock(&self.results);
    let result = results.remove(&task_id)?;
    match result.downcast::<T>() {
      Ok(value) => Some(*value),
      Err(result) => {
        warn!(?task_id, expected = std::any::type_name::<T>(), "task result has a different type");
        results.insert(task_id, result);
        None
      }
    }
  }

  /// Finished task ids whose results have not been taken yet.
  pub fn completed(&self) -> Vec<TaskId> {
    let mut ids: Vec<TaskId> = lock(&self.results).keys().copied().collect();
    ids.sort();
    ids
  }

  pub fn is_pending(&self, task_id: TaskId) -> bool {
    lock(&self.pending).contains(&task_id)
  }

  /// Tasks queued or running.
  pub fn pending_count(&self) -> usize {
    lock(&self.pending).len()
  }

  /// Worker threads in rayon's pool.
  pub fn num_threads(&self) -> usize {
    rayon::current_num_threads()
  }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
  use super::*;

  fn wait_for<T: 'static>(executor: &TaskExecutor, task_id: TaskId) -> Option<T> {
    for _ in 0..5000 {
      if let Some(r) = executor.poll::<T>(task_id) {
        return Some(r);
      }
      std::thread::sleep(std::time::Duration::from_millis(1));
    }
    None
  }

  #[test]
  fn test_spawn_and_poll() {
    let executor = TaskExecutor::new();
    let task_id = executor.spawn(|| 42i32);
    assert_eq!(wait_for::<i32>(&executor, task_id), Some(42));
    // Results are taken once
    assert_eq!(executor.poll::<i32>(task_id), None);
  }

  #[test]
  fn test_multiple_tasks() {
    let executor = TaskExecutor::new();
    let ids: Vec<_> = (0..10).map(|i| executor.spawn(move || i * 2)).collect();
    let results: Vec<i32> = ids.iter().map(|&id| wait_for::<i32>(&executor, id).unwrap()).collect();
    assert_eq!(results, vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);
    assert_eq!(executor.pending_count(), 0);
  }

  #[test]
  fn test_wrong_type_keeps_result() {
    let executor = TaskExecutor::new();
    let task_id = executor.spawn(|| String::from("built"));
    for _ in 0..5000 {
      if executor.completed().contains(&task_id) {
        break;
      }
      std::thread::sleep(std::time::Duration::from_millis(1));
    }
    assert_eq!(executor.poll::<u32>(task_id), None);
    // Still available under its real type
    assert!(executor.completed().contains(&task_id));
    assert_eq!(executor.poll::<String>(task_id).as_deref(), Some("built"));
    assert!(executor.completed().is_empty());
  }

  #[test]
  fn test_num_threads() {
    assert!(TaskExecutor::new().num_threads() >= 1);
  }
}
