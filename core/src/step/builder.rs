// chunkflow/src/step/builder.rs

//! The `StepBuilder`: explicit, validated step construction.
//!
//! All configuration errors are raised here, before any record flows; a
//! built `Step` can no longer fail for configuration reasons.

use crate::core::item::{ItemSink, ItemSource, ItemTransformer};
use crate::error::{BatchError, BatchResult};
use crate::scheduler::ExecutionScheduler;
use crate::step::runner::Step;
use crate::transaction::{NoopTransactionManager, TransactionManager};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default chunk size when none is configured. Illustrative, not
/// load-bearing: any size >= 1 is accepted.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Builder for a [`Step`]. Chunk size defaults to [`DEFAULT_CHUNK_SIZE`],
/// the scheduler to synchronous, and the transaction manager to
/// [`NoopTransactionManager`].
pub struct StepBuilder {
  name: String,
  chunk_size: usize,
  scheduler: ExecutionScheduler,
  transaction_manager: Option<Arc<dyn TransactionManager>>,
}

impl StepBuilder {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      chunk_size: DEFAULT_CHUNK_SIZE,
      scheduler: ExecutionScheduler::default(),
      transaction_manager: None,
    }
  }

  /// Sets the chunk size: the single most important tuning knob. Larger
  /// chunks amortize transaction overhead at the cost of a larger rollback
  /// blast radius and memory footprint.
  pub fn chunk_size(mut self, chunk_size: usize) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  pub fn scheduler(mut self, scheduler: ExecutionScheduler) -> Self {
    self.scheduler = scheduler;
    self
  }

  /// Convenience for the `workerPoolSize` configuration surface; 1 selects
  /// the synchronous scheduler. Validation happens in `build`.
  pub fn worker_pool_size(mut self, size: usize) -> Self {
    self.scheduler = match size {
      1 => ExecutionScheduler::Synchronous,
      n => ExecutionScheduler::Pooled { workers: n },
    };
    self
  }

  pub fn transaction_manager(mut self, manager: Arc<dyn TransactionManager>) -> Self {
    self.transaction_manager = Some(manager);
    self
  }

  /// Assembles the step, validating the configuration. Source, transformer
  /// and sink item types must line up; the compiler enforces that part.
  pub fn build<Src, Tr, Snk>(self, source: Src, transformer: Tr, sink: Snk) -> BatchResult<Step<Src, Tr, Snk>>
  where
    Src: ItemSource + 'static,
    Tr: ItemTransformer<Input = Src::Item> + 'static,
    Snk: ItemSink<Item = Tr::Output> + 'static,
  {
    if self.name.is_empty() {
      return Err(BatchError::configuration("step", "step name must not be empty"));
    }
    if self.chunk_size == 0 {
      return Err(BatchError::configuration(
        self.name.clone(),
        "chunk size must be >= 1",
      ));
    }
    if let ExecutionScheduler::Pooled { workers: 0 } = self.scheduler {
      return Err(BatchError::configuration(
        self.name.clone(),
        "worker pool size must be >= 1 (1 = synchronous)",
      ));
    }

    Ok(Step {
      name: self.name,
      chunk_size: self.chunk_size,
      scheduler: self.scheduler,
      source: Arc::new(Mutex::new(source)),
      transformer: Arc::new(transformer),
      sink: Arc::new(sink),
      transaction_manager: self
        .transaction_manager
        .unwrap_or_else(|| Arc::new(NoopTransactionManager)),
    })
  }
}
