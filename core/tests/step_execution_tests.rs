// tests/step_execution_tests.rs
mod common; // Reference the common module

use common::*;
use chunkflow::{
  BatchError, BatchStatus, CancelToken, ExecutionScheduler, IdentityTransformer, InMemoryLedger, StepBuilder,
};
use std::sync::Arc;

fn test_ledger() -> Arc<InMemoryLedger> {
  Arc::new(InMemoryLedger::new())
}

#[tokio::test]
async fn test_flush_count_is_ceil_of_len_over_chunk_size() {
  setup_tracing();
  let sink = RecordingSink::new();
  let step = StepBuilder::new("csv-step")
    .chunk_size(2)
    .build(VecSource::numbered(5), IdentityTransformer::new(), sink.clone())
    .unwrap();

  let ledger = test_ledger();
  let execution = step.execute(ledger.clone(), CancelToken::new()).await;

  assert_eq!(execution.status, BatchStatus::Completed);
  assert_eq!(execution.read_count, 5);
  assert_eq!(execution.write_count, 5);
  assert_eq!(execution.filter_count, 0);
  assert!(execution.start_time.is_some());
  assert!(execution.end_time.is_some());
  assert_eq!(sink.flush_sizes(), vec![2, 2, 1]);
  assert_eq!(ledger.commit_count(), 3);
}

#[tokio::test]
async fn test_exact_multiple_has_no_partial_flush() {
  setup_tracing();
  let sink = RecordingSink::new();
  let step = StepBuilder::new("csv-step")
    .chunk_size(3)
    .build(VecSource::numbered(6), IdentityTransformer::new(), sink.clone())
    .unwrap();

  let execution = step.execute(test_ledger(), CancelToken::new()).await;

  assert_eq!(execution.status, BatchStatus::Completed);
  assert_eq!(sink.flush_sizes(), vec![3, 3]);
}

#[tokio::test]
async fn test_chunk_size_one_flushes_per_record() {
  setup_tracing();
  let sink = RecordingSink::new();
  let step = StepBuilder::new("csv-step")
    .chunk_size(1)
    .build(VecSource::numbered(3), IdentityTransformer::new(), sink.clone())
    .unwrap();

  let execution = step.execute(test_ledger(), CancelToken::new()).await;

  assert_eq!(execution.status, BatchStatus::Completed);
  assert_eq!(sink.flush_sizes(), vec![1, 1, 1]);
  assert_eq!(execution.write_count, 3);
}

#[tokio::test]
async fn test_filtered_records_never_reach_the_sink() {
  setup_tracing();
  let sink = RecordingSink::new();
  let step = StepBuilder::new("csv-step")
    .chunk_size(2)
    .build(
      VecSource::new(&["r1", "skip-a", "r2", "skip-b", "r3"]),
      FilteringTransformer { reject_containing: "skip" },
      sink.clone(),
    )
    .unwrap();

  let execution = step.execute(test_ledger(), CancelToken::new()).await;

  assert_eq!(execution.status, BatchStatus::Completed);
  assert_eq!(execution.read_count, 5);
  assert_eq!(execution.filter_count, 2);
  assert_eq!(execution.write_count, 3);
  // Output order equals input order minus the filtered subset.
  assert_eq!(sink.flushed_items(), vec!["r1", "r2", "r3"]);
}

#[tokio::test]
async fn test_write_failure_rolls_back_and_fails_the_step() {
  setup_tracing();
  let sink = RecordingSink::new().fail_on_flush(2);
  let txn = RecordingTransactionManager::new();
  let step = StepBuilder::new("csv-step")
    .chunk_size(2)
    .transaction_manager(Arc::new(txn.clone()))
    .build(VecSource::numbered(5), IdentityTransformer::new(), sink.clone())
    .unwrap();

  let ledger = test_ledger();
  let execution = step.execute(ledger.clone(), CancelToken::new()).await;

  assert_eq!(execution.status, BatchStatus::Failed);
  // Only the first flush counts; the rolled-back chunk's items do not.
  assert_eq!(execution.write_count, 2);
  assert_eq!(sink.flush_sizes(), vec![2]);
  // No third flush is attempted after the failure.
  assert_eq!(sink.attempt_count(), 2);
  assert_eq!(txn.begin_count(), 2);
  assert_eq!(txn.commit_count(), 1);
  assert_eq!(txn.rollback_count(), 1);
  assert_eq!(ledger.commit_count(), 1);
  match execution.failure.as_deref() {
    Some(BatchError::Write { len, .. }) => assert_eq!(*len, 2),
    other => panic!("expected a Write failure, got {:?}", other),
  }
}

#[tokio::test]
async fn test_read_failure_aborts_the_step() {
  setup_tracing();
  let sink = RecordingSink::new();
  let step = StepBuilder::new("csv-step")
    .chunk_size(2)
    .build(
      VecSource::numbered(5).failing_at(3),
      IdentityTransformer::new(),
      sink.clone(),
    )
    .unwrap();

  let execution = step.execute(test_ledger(), CancelToken::new()).await;

  assert_eq!(execution.status, BatchStatus::Failed);
  // The first chunk committed before the bad record was reached.
  assert_eq!(execution.write_count, 2);
  match execution.failure.as_deref() {
    Some(BatchError::Read { offset, .. }) => assert_eq!(*offset, 3),
    other => panic!("expected a Read failure, got {:?}", other),
  }
}

#[tokio::test]
async fn test_transform_failure_aborts_the_step() {
  setup_tracing();
  let sink = RecordingSink::new();
  let step = StepBuilder::new("csv-step")
    .chunk_size(2)
    .build(
      VecSource::numbered(5),
      FailingTransformer { fail_containing: "r4" },
      sink.clone(),
    )
    .unwrap();

  let execution = step.execute(test_ledger(), CancelToken::new()).await;

  assert_eq!(execution.status, BatchStatus::Failed);
  assert_eq!(execution.write_count, 2);
  assert_eq!(sink.flushed_items(), vec!["r1", "r2"]);
  assert!(matches!(execution.failure.as_deref(), Some(BatchError::Process { .. })));
}

#[tokio::test]
async fn test_empty_source_completes_without_flushes() {
  setup_tracing();
  let sink = RecordingSink::new();
  let step = StepBuilder::new("csv-step")
    .chunk_size(10)
    .build(VecSource::new(&[]), IdentityTransformer::new(), sink.clone())
    .unwrap();

  let execution = step.execute(test_ledger(), CancelToken::new()).await;

  assert_eq!(execution.status, BatchStatus::Completed);
  assert_eq!(execution.read_count, 0);
  assert_eq!(execution.write_count, 0);
  assert_eq!(sink.attempt_count(), 0);
}

#[tokio::test]
async fn test_build_rejects_zero_chunk_size() {
  let result = StepBuilder::new("csv-step").chunk_size(0).build(
    VecSource::numbered(1),
    IdentityTransformer::<String>::new(),
    RecordingSink::new(),
  );
  assert!(matches!(result.err(), Some(BatchError::Configuration { .. })));
}

#[tokio::test]
async fn test_build_rejects_zero_workers() {
  let result = StepBuilder::new("csv-step").worker_pool_size(0).build(
    VecSource::numbered(1),
    IdentityTransformer::<String>::new(),
    RecordingSink::new(),
  );
  assert!(matches!(result.err(), Some(BatchError::Configuration { .. })));
}

#[test]
fn test_scheduler_from_worker_pool_size() {
  assert!(ExecutionScheduler::from_worker_pool_size(0).is_err());
  assert_eq!(
    ExecutionScheduler::from_worker_pool_size(1).unwrap(),
    ExecutionScheduler::Synchronous
  );
  assert_eq!(
    ExecutionScheduler::from_worker_pool_size(4).unwrap(),
    ExecutionScheduler::Pooled { workers: 4 }
  );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pooled_step_processes_every_record_exactly_once() {
  setup_tracing();
  let sink = RecordingSink::new();
  let step = StepBuilder::new("csv-step")
    .chunk_size(4)
    .worker_pool_size(3)
    .build(VecSource::numbered(25), IdentityTransformer::new(), sink.clone())
    .unwrap();

  let ledger = test_ledger();
  let execution = step.execute(ledger.clone(), CancelToken::new()).await;

  assert_eq!(execution.status, BatchStatus::Completed);
  assert_eq!(execution.read_count, 25);
  assert_eq!(execution.write_count, 25);

  // Commit order across workers is unspecified; assert totals, not order.
  let sizes = sink.flush_sizes();
  assert_eq!(sizes.iter().sum::<usize>(), 25);
  assert!(sizes.iter().all(|s| *s <= 4 && *s > 0));
  assert_eq!(sizes.len(), 7); // ceil(25 / 4)
  assert_eq!(ledger.commit_count(), 7);

  let mut items = sink.flushed_items();
  items.sort();
  let mut expected: Vec<String> = (1..=25).map(|i| format!("r{}", i)).collect();
  expected.sort();
  assert_eq!(items, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pooled_write_failure_keeps_committed_chunks() {
  setup_tracing();
  let sink = RecordingSink::new().fail_on_flush(2);
  let step = StepBuilder::new("csv-step")
    .chunk_size(4)
    .worker_pool_size(3)
    .build(VecSource::numbered(25), IdentityTransformer::new(), sink.clone())
    .unwrap();

  let execution = step.execute(test_ledger(), CancelToken::new()).await;

  assert_eq!(execution.status, BatchStatus::Failed);
  assert!(matches!(execution.failure.as_deref(), Some(BatchError::Write { .. })));
  // write_count reflects exactly the chunks that committed; the failed
  // chunk's items are gone and at least one chunk never started.
  let flushed = sink.flushed_items();
  assert_eq!(execution.write_count, flushed.len() as u64);
  assert!(execution.write_count < 25);
}
