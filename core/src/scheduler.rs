// chunkflow/src/scheduler.rs

//! Decides how a step's chunk-units are dispatched.

use crate::error::{BatchError, BatchResult};

/// Dispatch mode for a step's chunk iterations.
///
/// - `Synchronous`: the driving loop runs entirely on the calling task.
///   Deterministic ordering, trivial failure semantics.
/// - `Pooled`: `workers` long-lived tasks each execute whole
///   read+transform+write chunk-units. Source reads are serialized across
///   workers; chunk *commit* order is unspecified. The first fatal error is
///   kept, further chunk-units are not started, and chunks already
///   committed stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionScheduler {
  Synchronous,
  Pooled { workers: usize },
}

impl ExecutionScheduler {
  /// Maps the `workerPoolSize` configuration value to a scheduler:
  /// 1 is synchronous, anything larger is pooled, 0 is rejected.
  pub fn from_worker_pool_size(size: usize) -> BatchResult<Self> {
    match size {
      0 => Err(BatchError::configuration(
        "scheduler",
        "worker pool size must be >= 1 (1 = synchronous)",
      )),
      1 => Ok(ExecutionScheduler::Synchronous),
      n => Ok(ExecutionScheduler::Pooled { workers: n }),
    }
  }

  pub fn worker_count(&self) -> usize {
    match self {
      ExecutionScheduler::Synchronous => 1,
      ExecutionScheduler::Pooled { workers } => *workers,
    }
  }
}

impl Default for ExecutionScheduler {
  fn default() -> Self {
    ExecutionScheduler::Synchronous
  }
}
