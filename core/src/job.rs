// chunkflow/src/job.rs

//! Job and flow composition: an ordered sequence of steps executed
//! fail-fast, plus the job-level cancellation token.

use crate::core::execution::{BatchStatus, JobExecution};
use crate::core::item::{ItemSink, ItemSource, ItemTransformer};
use crate::core::shared::Shared;
use crate::error::{BatchError, BatchResult};
use crate::ledger::{ExecutionLedger, InMemoryLedger};
use crate::step::runner::{Step, StepRunner};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// A cooperative job-level cancellation flag.
///
/// Cancelling prevents further chunk-units (and further steps) from
/// starting; in-flight chunk-units run to their natural commit/rollback
/// outcome. There is no mid-chunk interruption.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
  flag: Arc<AtomicBool>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.flag.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::SeqCst)
  }
}

/// An ordered sequence of steps. Linear: each step runs after the previous
/// one completed; steps never run concurrently with each other.
pub struct Flow {
  name: String,
  steps: Vec<Box<dyn StepRunner>>,
}

impl Flow {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      steps: Vec::new(),
    }
  }

  /// Appends a step to the flow. Steps over different record types mix
  /// freely; the flow holds them type-erased.
  pub fn step<Src, Tr, Snk>(mut self, step: Step<Src, Tr, Snk>) -> Self
  where
    Src: ItemSource + 'static,
    Tr: ItemTransformer<Input = Src::Item> + 'static,
    Snk: ItemSink<Item = Tr::Output> + 'static,
  {
    self.steps.push(Box::new(step));
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }
}

/// Builder for a [`Job`]. The ledger defaults to a fresh
/// [`InMemoryLedger`]; hand in a shared one to inspect write points or to
/// persist them.
pub struct JobBuilder {
  name: String,
  ledger: Option<Arc<dyn ExecutionLedger>>,
  cancel: Option<CancelToken>,
}

impl JobBuilder {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ledger: None,
      cancel: None,
    }
  }

  pub fn ledger(mut self, ledger: Arc<dyn ExecutionLedger>) -> Self {
    self.ledger = Some(ledger);
    self
  }

  /// Wires an externally-owned cancellation token, so collaborators created
  /// before the job (signal handlers, supervising tasks) can request a
  /// stop. Without this the job creates its own token.
  pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
    self.cancel = Some(cancel);
    self
  }

  /// Finalizes the job with the flow it will drive. Configuration errors
  /// (empty name, empty flow) are raised here, before the job can start.
  pub fn start(self, flow: Flow) -> BatchResult<Job> {
    if self.name.is_empty() {
      return Err(BatchError::configuration("job", "job name must not be empty"));
    }
    if flow.is_empty() {
      return Err(BatchError::configuration(
        self.name.clone(),
        format!("flow '{}' has no steps", flow.name()),
      ));
    }
    Ok(Job {
      name: self.name,
      flow,
      ledger: self.ledger.unwrap_or_else(|| Arc::new(InMemoryLedger::new())),
      cancel: self.cancel.unwrap_or_default(),
    })
  }
}

/// A runnable job: drives its flow's steps in order, fail-fast.
///
/// A job succeeds iff every step in its flow completed. On the first step
/// failure the remaining flow is aborted and the step's root cause is
/// propagated into the [`JobExecution`].
pub struct Job {
  name: String,
  flow: Flow,
  ledger: Arc<dyn ExecutionLedger>,
  cancel: CancelToken,
}

impl Job {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn ledger(&self) -> Arc<dyn ExecutionLedger> {
    Arc::clone(&self.ledger)
  }

  /// A clone of the job's cancellation token, safe to hand to another task
  /// or a signal handler.
  pub fn cancel_token(&self) -> CancelToken {
    self.cancel.clone()
  }

  /// Runs the flow to a terminal [`JobExecution`]. Data-path failures are
  /// reported through the execution's status and root cause, never as a
  /// panic or an `Err` from this method.
  #[instrument(
        name = "Job::run",
        skip_all,
        fields(
            job_name = %self.name,
            flow_name = %self.flow.name(),
            num_steps = self.flow.len()
        )
    )]
  pub async fn run(&self) -> JobExecution {
    event!(Level::DEBUG, "Job execution starting.");
    let execution = Shared::new(JobExecution::new(&self.name));
    execution.write().mark_started();
    if let Err(err) = self.ledger.job_started(&execution.snapshot()).await {
      event!(Level::ERROR, error = %err, "Ledger write failed at job start.");
    }

    let mut final_status = BatchStatus::Completed;
    let mut failure: Option<Arc<BatchError>> = None;

    for runner in &self.flow.steps {
      if self.cancel.is_cancelled() {
        event!(Level::INFO, "Cancellation requested; remaining steps will not start.");
        final_status = BatchStatus::Stopped;
        break;
      }

      let step_name = runner.name().to_string();
      event!(Level::DEBUG, step_name = %step_name, "Starting flow step.");
      let step_execution = runner.run_step(Arc::clone(&self.ledger), self.cancel.clone()).await;
      let step_status = step_execution.status;
      let step_failure = step_execution.failure.clone();
      execution.write().step_executions.push(step_execution);

      match step_status {
        BatchStatus::Completed => {}
        BatchStatus::Failed => {
          event!(Level::ERROR, step_name = %step_name, "Step failed; aborting remaining flow.");
          final_status = BatchStatus::Failed;
          failure = step_failure;
          break;
        }
        BatchStatus::Stopped => {
          final_status = BatchStatus::Stopped;
          break;
        }
        other => {
          final_status = BatchStatus::Failed;
          failure = Some(Arc::new(BatchError::Internal(format!(
            "step '{}' ended in non-terminal status {:?}",
            step_name, other
          ))));
          break;
        }
      }
    }

    {
      let mut guard = execution.write();
      match final_status {
        BatchStatus::Completed => guard.mark_completed(),
        BatchStatus::Failed => guard.mark_failed(failure),
        BatchStatus::Stopped => guard.mark_stopped(),
        _ => guard.mark_failed(None),
      }
    }

    let snapshot = execution.snapshot();
    if let Err(err) = self.ledger.job_ended(&snapshot).await {
      event!(Level::ERROR, error = %err, "Ledger write failed at job end.");
    }
    event!(Level::INFO, status = ?snapshot.status, "Job execution finished.");
    snapshot
  }
}
