// chunkflow/src/ledger.rs

//! The execution ledger: persisted job/step identity, status and progress
//! metrics, so a crashed run can report where it stopped.
//!
//! Write points: job start, step start, every successful chunk commit, step
//! terminal transition, job terminal transition. The ledger receives
//! snapshots, never live handles; a slow ledger cannot block counter
//! updates.

use crate::core::execution::{JobExecution, StepExecution};
use crate::error::BatchResult;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Receives execution-state snapshots at each write point.
///
/// A ledger failure after a successful chunk commit is logged and swallowed
/// by the engine: the chunk's data is already durable, and losing a
/// progress snapshot must not un-succeed it. Every other write point
/// propagates ledger behavior the same way.
#[async_trait]
pub trait ExecutionLedger: Send + Sync {
  /// Job transitioned STARTING -> STARTED.
  async fn job_started(&self, execution: &JobExecution) -> BatchResult<()>;

  /// Step transitioned STARTING -> STARTED.
  async fn step_started(&self, execution: &StepExecution) -> BatchResult<()>;

  /// A chunk committed; `execution.write_count` already includes it.
  async fn chunk_committed(&self, execution: &StepExecution) -> BatchResult<()>;

  /// Step reached a terminal status.
  async fn step_ended(&self, execution: &StepExecution) -> BatchResult<()>;

  /// Job reached a terminal status.
  async fn job_ended(&self, execution: &JobExecution) -> BatchResult<()>;
}

/// An in-process ledger retaining the full snapshot history, primarily for
/// tests and small tools. The trait is the seam for a persistent
/// implementation.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
  jobs: Mutex<Vec<JobExecution>>,
  steps: Mutex<Vec<StepExecution>>,
  commits: Mutex<Vec<StepExecution>>,
}

impl InMemoryLedger {
  pub fn new() -> Self {
    Self::default()
  }

  /// All job snapshots recorded so far, in write order.
  pub fn job_history(&self) -> Vec<JobExecution> {
    self.jobs.lock().clone()
  }

  /// All step start/end snapshots recorded so far, in write order.
  pub fn step_history(&self) -> Vec<StepExecution> {
    self.steps.lock().clone()
  }

  /// One snapshot per successful chunk commit.
  pub fn commit_history(&self) -> Vec<StepExecution> {
    self.commits.lock().clone()
  }

  pub fn commit_count(&self) -> usize {
    self.commits.lock().len()
  }
}

#[async_trait]
impl ExecutionLedger for InMemoryLedger {
  async fn job_started(&self, execution: &JobExecution) -> BatchResult<()> {
    self.jobs.lock().push(execution.clone());
    Ok(())
  }

  async fn step_started(&self, execution: &StepExecution) -> BatchResult<()> {
    self.steps.lock().push(execution.clone());
    Ok(())
  }

  async fn chunk_committed(&self, execution: &StepExecution) -> BatchResult<()> {
    self.commits.lock().push(execution.clone());
    Ok(())
  }

  async fn step_ended(&self, execution: &StepExecution) -> BatchResult<()> {
    self.steps.lock().push(execution.clone());
    Ok(())
  }

  async fn job_ended(&self, execution: &JobExecution) -> BatchResult<()> {
    self.jobs.lock().push(execution.clone());
    Ok(())
  }
}
