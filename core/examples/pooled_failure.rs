// chunkflow/examples/pooled_failure.rs
//
// Fail-fast under the pooled scheduler: one chunk's write fails, the pool
// stops starting new chunk-units, already-committed chunks stand, and the
// job reports FAILED with the root cause.

use async_trait::async_trait;
use chunkflow::{BatchError, BatchResult, Flow, IdentityTransformer, ItemSink, ItemSource, JobBuilder, StepBuilder};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

struct NumberSource {
  next: u32,
  end: u32,
}

#[async_trait]
impl ItemSource for NumberSource {
  type Item = u32;

  async fn next(&mut self) -> BatchResult<Option<u32>> {
    if self.next > self.end {
      return Ok(None);
    }
    let value = self.next;
    self.next += 1;
    Ok(Some(value))
  }
}

/// Commits chunks into memory, failing the third write attempt.
#[derive(Clone, Default)]
struct FlakySink {
  committed: Arc<Mutex<Vec<u32>>>,
  attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl ItemSink for FlakySink {
  type Item = u32;

  async fn write(&self, chunk: &[u32]) -> BatchResult<()> {
    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
    if attempt == 3 {
      return Err(BatchError::write(
        chunk.len(),
        anyhow::anyhow!("storage rejected flush {attempt}"),
      ));
    }
    self.committed.lock().extend_from_slice(chunk);
    Ok(())
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Pooled Failure Example ---");

  let sink = FlakySink::default();
  let step = StepBuilder::new("flaky-step")
    .chunk_size(5)
    .worker_pool_size(3)
    .build(NumberSource { next: 1, end: 100 }, IdentityTransformer::new(), sink.clone())?;

  let job = JobBuilder::new("flakyJob").start(Flow::new("flakyFlow").step(step))?;
  let execution = job.run().await;

  info!("Job finished: {:?}", execution.status);
  if let Some(failure) = &execution.failure {
    info!("Root cause: {}", failure);
  }

  let step_execution = &execution.step_executions[0];
  let committed = sink.committed.lock();
  info!(
    "write_count={} matches {} records committed before the pool stopped (of 100).",
    step_execution.write_count,
    committed.len(),
  );
  assert_eq!(step_execution.write_count as usize, committed.len());

  Ok(())
}
