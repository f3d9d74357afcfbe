// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use chunkflow::{BatchError, BatchResult, CancelToken, ItemSink, ItemSource, ItemTransformer, Transaction, TransactionManager};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::Level;

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Common Source ---

/// In-memory source over string records, with an optional injected read
/// failure at a given 1-based record offset.
pub struct VecSource {
  items: VecDeque<String>,
  offset: u64,
  fail_at: Option<u64>,
}

impl VecSource {
  pub fn new(items: &[&str]) -> Self {
    Self {
      items: items.iter().map(|s| (*s).to_string()).collect(),
      offset: 0,
      fail_at: None,
    }
  }

  pub fn numbered(count: usize) -> Self {
    Self {
      items: (1..=count).map(|i| format!("r{}", i)).collect(),
      offset: 0,
      fail_at: None,
    }
  }

  pub fn failing_at(mut self, offset: u64) -> Self {
    self.fail_at = Some(offset);
    self
  }
}

#[async_trait]
impl ItemSource for VecSource {
  type Item = String;

  async fn next(&mut self) -> BatchResult<Option<String>> {
    let next_offset = self.offset + 1;
    if self.fail_at == Some(next_offset) {
      return Err(BatchError::read(
        next_offset,
        anyhow::anyhow!("injected read failure"),
      ));
    }
    match self.items.pop_front() {
      Some(item) => {
        self.offset = next_offset;
        Ok(Some(item))
      }
      None => Ok(None),
    }
  }
}

// --- Common Transformers ---

pub struct UppercaseTransformer;

#[async_trait]
impl ItemTransformer for UppercaseTransformer {
  type Input = String;
  type Output = String;

  async fn transform(&self, item: String) -> BatchResult<Option<String>> {
    Ok(Some(item.to_uppercase()))
  }
}

/// Filters out every record containing the given needle.
pub struct FilteringTransformer {
  pub reject_containing: &'static str,
}

#[async_trait]
impl ItemTransformer for FilteringTransformer {
  type Input = String;
  type Output = String;

  async fn transform(&self, item: String) -> BatchResult<Option<String>> {
    if item.contains(self.reject_containing) {
      Ok(None)
    } else {
      Ok(Some(item))
    }
  }
}

/// Fails with a Process error on the first record containing the needle.
pub struct FailingTransformer {
  pub fail_containing: &'static str,
}

#[async_trait]
impl ItemTransformer for FailingTransformer {
  type Input = String;
  type Output = String;

  async fn transform(&self, item: String) -> BatchResult<Option<String>> {
    if item.contains(self.fail_containing) {
      Err(BatchError::process(anyhow::anyhow!(
        "injected transform failure on '{}'",
        item
      )))
    } else {
      Ok(Some(item))
    }
  }
}

/// Passes records through and cancels the given token upon seeing the
/// needle. The chunk-unit in flight still runs to its natural outcome.
pub struct CancellingTransformer {
  pub cancel_on: &'static str,
  pub token: CancelToken,
}

#[async_trait]
impl ItemTransformer for CancellingTransformer {
  type Input = String;
  type Output = String;

  async fn transform(&self, item: String) -> BatchResult<Option<String>> {
    if item.contains(self.cancel_on) {
      self.token.cancel();
    }
    Ok(Some(item))
  }
}

// --- Common Sink ---

#[derive(Default)]
struct SinkState {
  flushes: Mutex<Vec<Vec<String>>>,
  fail_on_attempt: Mutex<Option<usize>>,
  attempts: AtomicUsize,
}

/// Records every successful flush; cheap to clone so tests keep a handle
/// for assertions after the step consumed the sink.
#[derive(Clone, Default)]
pub struct RecordingSink {
  state: Arc<SinkState>,
}

impl RecordingSink {
  pub fn new() -> Self {
    Self::default()
  }

  /// Injects a write failure on the given 1-based flush attempt.
  pub fn fail_on_flush(self, attempt: usize) -> Self {
    *self.state.fail_on_attempt.lock() = Some(attempt);
    self
  }

  pub fn flushes(&self) -> Vec<Vec<String>> {
    self.state.flushes.lock().clone()
  }

  pub fn flush_sizes(&self) -> Vec<usize> {
    self.state.flushes.lock().iter().map(|f| f.len()).collect()
  }

  /// All committed items, flattened in commit order.
  pub fn flushed_items(&self) -> Vec<String> {
    self.state.flushes.lock().iter().flatten().cloned().collect()
  }

  /// Write attempts, including failed ones.
  pub fn attempt_count(&self) -> usize {
    self.state.attempts.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ItemSink for RecordingSink {
  type Item = String;

  async fn write(&self, chunk: &[String]) -> BatchResult<()> {
    let attempt = self.state.attempts.fetch_add(1, Ordering::SeqCst) + 1;
    if *self.state.fail_on_attempt.lock() == Some(attempt) {
      return Err(BatchError::write(
        chunk.len(),
        anyhow::anyhow!("injected write failure on flush {}", attempt),
      ));
    }
    self.state.flushes.lock().push(chunk.to_vec());
    Ok(())
  }
}

// --- Transaction Manager with Counters ---

#[derive(Default)]
struct TxnState {
  begins: AtomicUsize,
  commits: AtomicUsize,
  rollbacks: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct RecordingTransactionManager {
  state: Arc<TxnState>,
}

impl RecordingTransactionManager {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn begin_count(&self) -> usize {
    self.state.begins.load(Ordering::SeqCst)
  }

  pub fn commit_count(&self) -> usize {
    self.state.commits.load(Ordering::SeqCst)
  }

  pub fn rollback_count(&self) -> usize {
    self.state.rollbacks.load(Ordering::SeqCst)
  }
}

struct RecordingTransaction {
  state: Arc<TxnState>,
}

#[async_trait]
impl Transaction for RecordingTransaction {
  async fn commit(self: Box<Self>) -> BatchResult<()> {
    self.state.commits.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> BatchResult<()> {
    self.state.rollbacks.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

#[async_trait]
impl TransactionManager for RecordingTransactionManager {
  async fn begin(&self) -> BatchResult<Box<dyn Transaction>> {
    self.state.begins.fetch_add(1, Ordering::SeqCst);
    Ok(Box::new(RecordingTransaction {
      state: Arc::clone(&self.state),
    }))
  }
}
