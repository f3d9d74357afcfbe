// chunkflow/src/step/runner.rs

//! The step driver: the central chunk loop, the transaction-per-chunk
//! commit protocol, and its pooled variant.
//!
//! One chunk-unit = read+transform until the chunk is full (or the stream
//! ends), then flush the chunk inside one transaction. The synchronous
//! scheduler runs chunk-units back to back on the calling task; the pooled
//! scheduler runs them on N worker tasks with source reads serialized
//! behind a mutex.

use crate::core::chunk::Chunk;
use crate::core::execution::{BatchStatus, StepExecution};
use crate::core::item::{ItemSink, ItemSource, ItemTransformer};
use crate::core::shared::Shared;
use crate::error::{BatchError, BatchResult};
use crate::job::CancelToken;
use crate::ledger::ExecutionLedger;
use crate::scheduler::ExecutionScheduler;
use crate::transaction::TransactionManager;
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{event, instrument, Level};

/// Internal verdict of a step's driving loop, before it is folded into the
/// execution's terminal status.
enum StepOutcome {
  Completed,
  Stopped,
}

/// One bounded unit of chunked read/transform/write work.
///
/// Composes a source, a transformer, a sink, the chunk accumulator and the
/// transaction manager; built via [`StepBuilder`](crate::StepBuilder).
/// A step owns its source exclusively for the duration of one execution
/// and reports the outcome as a [`StepExecution`].
pub struct Step<Src, Tr, Snk>
where
  Src: ItemSource + 'static,
  Tr: ItemTransformer<Input = Src::Item> + 'static,
  Snk: ItemSink<Item = Tr::Output> + 'static,
{
  pub(crate) name: String,
  pub(crate) chunk_size: usize,
  pub(crate) scheduler: ExecutionScheduler,
  // The single read cursor. Pooled workers serialize on this mutex; it is
  // a tokio mutex because `next().await` suspends while the cursor is held.
  pub(crate) source: Arc<Mutex<Src>>,
  pub(crate) transformer: Arc<Tr>,
  pub(crate) sink: Arc<Snk>,
  pub(crate) transaction_manager: Arc<dyn TransactionManager>,
}

impl<Src, Tr, Snk> Step<Src, Tr, Snk>
where
  Src: ItemSource + 'static,
  Tr: ItemTransformer<Input = Src::Item> + 'static,
  Snk: ItemSink<Item = Tr::Output> + 'static,
{
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn chunk_size(&self) -> usize {
    self.chunk_size
  }

  pub fn scheduler(&self) -> ExecutionScheduler {
    self.scheduler
  }

  /// Executes the step to its terminal state, recording ledger write points
  /// along the way. Never panics on data-path errors: failures end up as a
  /// `Failed` status with the root cause attached.
  #[instrument(
        name = "Step::execute",
        skip_all,
        fields(
            step_name = %self.name,
            chunk_size = self.chunk_size,
            scheduler = ?self.scheduler
        )
    )]
  pub async fn execute(&self, ledger: Arc<dyn ExecutionLedger>, cancel: CancelToken) -> StepExecution {
    let execution = Shared::new(StepExecution::new(&self.name));
    execution.write().mark_started();
    if let Err(err) = ledger.step_started(&execution.snapshot()).await {
      event!(Level::ERROR, error = %err, "Ledger write failed at step start.");
    }
    event!(Level::DEBUG, "Step execution starting.");

    let outcome = match self.scheduler {
      ExecutionScheduler::Synchronous => self.run_synchronous(&execution, ledger.as_ref(), &cancel).await,
      ExecutionScheduler::Pooled { workers } => {
        self
          .run_pooled(workers, &execution, Arc::clone(&ledger), cancel.clone())
          .await
      }
    };

    {
      let mut guard = execution.write();
      match outcome {
        Ok(StepOutcome::Completed) => guard.mark_completed(),
        Ok(StepOutcome::Stopped) => guard.mark_stopped(),
        Err(err) => guard.mark_failed(Arc::new(err)),
      }
    }

    let snapshot = execution.snapshot();
    match snapshot.status {
      BatchStatus::Completed => event!(
        Level::INFO,
        read = snapshot.read_count,
        written = snapshot.write_count,
        filtered = snapshot.filter_count,
        "Step completed."
      ),
      BatchStatus::Stopped => event!(
        Level::INFO,
        written = snapshot.write_count,
        "Step stopped by cancellation."
      ),
      BatchStatus::Failed => {
        if let Some(failure) = snapshot.failure.as_deref() {
          event!(Level::ERROR, written = snapshot.write_count, error = %failure, "Step failed.");
        }
      }
      _ => {}
    }
    if let Err(err) = ledger.step_ended(&snapshot).await {
      event!(Level::ERROR, error = %err, "Ledger write failed at step end.");
    }
    snapshot
  }

  /// The driving loop on the calling task: deterministic ordering, first
  /// error aborts immediately.
  async fn run_synchronous(
    &self,
    execution: &Shared<StepExecution>,
    ledger: &dyn ExecutionLedger,
    cancel: &CancelToken,
  ) -> BatchResult<StepOutcome> {
    let mut source = self.source.lock().await;
    let mut chunk = Chunk::new(self.chunk_size);
    loop {
      // Cancellation is observed between chunk-units only; an in-flight
      // unit always runs to its natural commit/rollback outcome.
      if cancel.is_cancelled() {
        return Ok(StepOutcome::Stopped);
      }
      let end_of_stream = fill_chunk(&mut *source, self.transformer.as_ref(), &mut chunk, execution).await?;
      if !chunk.is_empty() {
        flush_chunk(
          &self.name,
          self.sink.as_ref(),
          self.transaction_manager.as_ref(),
          chunk.take(),
          execution,
          ledger,
        )
        .await?;
      }
      if end_of_stream {
        return Ok(StepOutcome::Completed);
      }
    }
  }

  /// Pooled dispatch: `workers` long-lived tasks each execute whole
  /// chunk-units. Commit order across workers is unspecified; the first
  /// fatal error is kept, later chunk-units are not started, and chunks
  /// already committed stand.
  async fn run_pooled(
    &self,
    workers: usize,
    execution: &Shared<StepExecution>,
    ledger: Arc<dyn ExecutionLedger>,
    cancel: CancelToken,
  ) -> BatchResult<StepOutcome> {
    let exhausted = Arc::new(AtomicBool::new(false));
    let first_failure: Arc<SyncMutex<Option<BatchError>>> = Arc::new(SyncMutex::new(None));
    // Internal stop-the-pool signal, distinct from the job-level token.
    let abort = CancelToken::new();

    let mut pool = JoinSet::new();
    for worker_index in 0..workers {
      let source = Arc::clone(&self.source);
      let transformer = Arc::clone(&self.transformer);
      let sink = Arc::clone(&self.sink);
      let transaction_manager = Arc::clone(&self.transaction_manager);
      let ledger = Arc::clone(&ledger);
      let execution = execution.clone();
      let cancel = cancel.clone();
      let abort = abort.clone();
      let exhausted = Arc::clone(&exhausted);
      let first_failure = Arc::clone(&first_failure);
      let step_name = self.name.clone();
      let chunk_size = self.chunk_size;

      pool.spawn(async move {
        loop {
          if cancel.is_cancelled() || abort.is_cancelled() || exhausted.load(Ordering::SeqCst) {
            break;
          }
          let mut chunk = Chunk::new(chunk_size);
          let end_of_stream = {
            let mut source = source.lock().await;
            // Another worker may have drained the stream while we waited
            // for the cursor.
            if exhausted.load(Ordering::SeqCst) {
              break;
            }
            match fill_chunk(&mut *source, transformer.as_ref(), &mut chunk, &execution).await {
              Ok(end) => end,
              Err(err) => {
                record_first_failure(&first_failure, &abort, err);
                break;
              }
            }
          };
          if end_of_stream {
            exhausted.store(true, Ordering::SeqCst);
          }
          if !chunk.is_empty() {
            event!(
              Level::TRACE,
              worker = worker_index,
              len = chunk.len(),
              "Worker flushing chunk."
            );
            if let Err(err) = flush_chunk(
              &step_name,
              sink.as_ref(),
              transaction_manager.as_ref(),
              chunk.take(),
              &execution,
              ledger.as_ref(),
            )
            .await
            {
              record_first_failure(&first_failure, &abort, err);
              break;
            }
          }
          if end_of_stream {
            break;
          }
        }
      });
    }

    while let Some(joined) = pool.join_next().await {
      if let Err(join_err) = joined {
        record_first_failure(
          &first_failure,
          &abort,
          BatchError::Internal(format!("worker task did not finish: {join_err}")),
        );
      }
    }

    if let Some(err) = first_failure.lock().take() {
      return Err(err);
    }
    if cancel.is_cancelled() {
      Ok(StepOutcome::Stopped)
    } else {
      Ok(StepOutcome::Completed)
    }
  }
}

/// Reads and transforms records until the chunk is full or the stream ends.
/// Returns `Ok(true)` at end of stream. Counter updates take the execution
/// lock per item and never hold it across an `.await`.
async fn fill_chunk<Src, Tr>(
  source: &mut Src,
  transformer: &Tr,
  chunk: &mut Chunk<Tr::Output>,
  execution: &Shared<StepExecution>,
) -> BatchResult<bool>
where
  Src: ItemSource,
  Tr: ItemTransformer<Input = Src::Item>,
{
  while !chunk.is_full() {
    match source.next().await? {
      Some(item) => {
        execution.write().read_count += 1;
        match transformer.transform(item).await? {
          Some(output) => chunk.push(output),
          None => execution.write().filter_count += 1,
        }
      }
      None => return Ok(true),
    }
  }
  Ok(false)
}

/// Flushes one chunk inside one transaction: begin, write, commit on
/// success / rollback on failure. `write_count` grows only after the
/// commit, so a rolled-back chunk's items are never counted.
async fn flush_chunk<Snk>(
  step_name: &str,
  sink: &Snk,
  transaction_manager: &dyn TransactionManager,
  items: Vec<Snk::Item>,
  execution: &Shared<StepExecution>,
  ledger: &dyn ExecutionLedger,
) -> BatchResult<()>
where
  Snk: ItemSink,
{
  let len = items.len();
  let transaction = transaction_manager.begin().await?;
  match sink.write(&items).await {
    Ok(()) => {
      transaction.commit().await?;
      execution.write().write_count += len as u64;
      event!(Level::DEBUG, step_name, len, "Chunk committed.");
      // The chunk is durable at this point; a ledger failure must not
      // un-succeed it.
      if let Err(err) = ledger.chunk_committed(&execution.snapshot()).await {
        event!(Level::ERROR, error = %err, "Ledger write failed after chunk commit.");
      }
      Ok(())
    }
    Err(err) => {
      event!(Level::ERROR, step_name, len, error = %err, "Chunk write failed; rolling back.");
      if let Err(rollback_err) = transaction.rollback().await {
        event!(Level::ERROR, error = %rollback_err, "Rollback itself failed.");
      }
      Err(err)
    }
  }
}

fn record_first_failure(slot: &SyncMutex<Option<BatchError>>, abort: &CancelToken, err: BatchError) {
  let mut guard = slot.lock();
  if guard.is_none() {
    *guard = Some(err);
  } else {
    event!(Level::DEBUG, error = %err, "Secondary worker failure after pool abort.");
  }
  abort.cancel();
}

/// Type-erased step execution, so a `Flow` can hold steps over different
/// record types.
#[async_trait]
pub(crate) trait StepRunner: Send + Sync {
  fn name(&self) -> &str;

  async fn run_step(&self, ledger: Arc<dyn ExecutionLedger>, cancel: CancelToken) -> StepExecution;
}

#[async_trait]
impl<Src, Tr, Snk> StepRunner for Step<Src, Tr, Snk>
where
  Src: ItemSource + 'static,
  Tr: ItemTransformer<Input = Src::Item> + 'static,
  Snk: ItemSink<Item = Tr::Output> + 'static,
{
  fn name(&self) -> &str {
    &self.name
  }

  async fn run_step(&self, ledger: Arc<dyn ExecutionLedger>, cancel: CancelToken) -> StepExecution {
    self.execute(ledger, cancel).await
  }
}
