// chunkflow/src/core/execution.rs

//! Execution records: the status enum plus the mutable `StepExecution` and
//! `JobExecution` progress records tracked by the execution ledger.

use crate::error::BatchError;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Lifecycle status shared by step and job executions.
///
/// `Completed`, `Failed` and `Stopped` are terminal; once an execution
/// reaches one of them it is never mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
  /// Created, not yet running.
  Starting,
  /// Actively processing.
  Started,
  /// All work finished successfully.
  Completed,
  /// Aborted by an unrecovered error.
  Failed,
  /// Halted by a cancellation request before the stream was exhausted.
  Stopped,
}

impl BatchStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Stopped)
  }
}

/// Progress record for one step execution.
///
/// Mutated only by the step driver and by the commit path; `write_count`
/// grows strictly after a successful chunk commit, so a rolled-back chunk's
/// items are never counted.
#[derive(Debug, Clone)]
pub struct StepExecution {
  pub step_name: String,
  pub status: BatchStatus,
  /// Records pulled from the source.
  pub read_count: u64,
  /// Records durably committed through the sink.
  pub write_count: u64,
  /// Records the transformer filtered out.
  pub filter_count: u64,
  pub start_time: Option<DateTime<Utc>>,
  pub end_time: Option<DateTime<Utc>>,
  /// Root cause of a `Failed` status. `Arc` keeps the record `Clone` for
  /// ledger snapshots.
  pub failure: Option<Arc<BatchError>>,
}

impl StepExecution {
  pub fn new(step_name: impl Into<String>) -> Self {
    Self {
      step_name: step_name.into(),
      status: BatchStatus::Starting,
      read_count: 0,
      write_count: 0,
      filter_count: 0,
      start_time: None,
      end_time: None,
      failure: None,
    }
  }

  pub(crate) fn mark_started(&mut self) {
    self.status = BatchStatus::Started;
    self.start_time = Some(Utc::now());
  }

  pub(crate) fn mark_completed(&mut self) {
    self.status = BatchStatus::Completed;
    self.end_time = Some(Utc::now());
  }

  pub(crate) fn mark_failed(&mut self, failure: Arc<BatchError>) {
    self.status = BatchStatus::Failed;
    self.failure = Some(failure);
    self.end_time = Some(Utc::now());
  }

  pub(crate) fn mark_stopped(&mut self) {
    self.status = BatchStatus::Stopped;
    self.end_time = Some(Utc::now());
  }
}

/// Progress record for one job execution: the job's own status plus the
/// step executions produced so far, in flow order.
#[derive(Debug, Clone)]
pub struct JobExecution {
  pub job_name: String,
  pub status: BatchStatus,
  pub step_executions: Vec<StepExecution>,
  pub start_time: Option<DateTime<Utc>>,
  pub end_time: Option<DateTime<Utc>>,
  /// Root cause propagated from the first failing step.
  pub failure: Option<Arc<BatchError>>,
}

impl JobExecution {
  pub fn new(job_name: impl Into<String>) -> Self {
    Self {
      job_name: job_name.into(),
      status: BatchStatus::Starting,
      step_executions: Vec::new(),
      start_time: None,
      end_time: None,
      failure: None,
    }
  }

  pub(crate) fn mark_started(&mut self) {
    self.status = BatchStatus::Started;
    self.start_time = Some(Utc::now());
  }

  pub(crate) fn mark_completed(&mut self) {
    self.status = BatchStatus::Completed;
    self.end_time = Some(Utc::now());
  }

  pub(crate) fn mark_failed(&mut self, failure: Option<Arc<BatchError>>) {
    self.status = BatchStatus::Failed;
    self.failure = failure;
    self.end_time = Some(Utc::now());
  }

  pub(crate) fn mark_stopped(&mut self) {
    self.status = BatchStatus::Stopped;
    self.end_time = Some(Utc::now());
  }
}
