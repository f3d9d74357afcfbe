// chunkflow/src/core/item.rs

//! The three item-flow traits a step is composed of: `ItemSource`,
//! `ItemTransformer` and `ItemSink`.
//!
//! All three are async because reads and writes are the step's I/O
//! suspension points. Transformers are expected to be pure; side effects
//! belong in the sink.

use crate::error::BatchResult;
use async_trait::async_trait;
use std::marker::PhantomData;

/// Produces a lazy sequence of records from an underlying medium (file,
/// table, queue).
///
/// `next` returns `Ok(None)` at end of stream. A source is exhaustible
/// exactly once per step execution; it is not restartable mid-stream.
/// Read failures surface as [`BatchError::Read`](crate::BatchError::Read)
/// carrying the record offset, and abort the step (the default policy is
/// equivalent to a skip limit of zero).
///
/// Under the pooled scheduler the engine serializes all calls to `next`
/// behind a mutex; implementations never need their own read-side locking.
#[async_trait]
pub trait ItemSource: Send {
  type Item: Send + 'static;

  async fn next(&mut self) -> BatchResult<Option<Self::Item>>;
}

/// Maps one input record to zero-or-one output record.
///
/// `Ok(None)` means the record is filtered out: it is counted in the step's
/// `filter_count` and never reaches the sink. Errors are classified as
/// [`BatchError::Process`](crate::BatchError::Process) and abort the step
/// immediately.
#[async_trait]
pub trait ItemTransformer: Send + Sync {
  type Input: Send + 'static;
  type Output: Send + 'static;

  async fn transform(&self, item: Self::Input) -> BatchResult<Option<Self::Output>>;
}

/// Durably persists one chunk of transformed records.
///
/// The whole slice must be treated as a single atomic unit: the engine
/// wraps each call in one transaction, and a
/// [`BatchError::Write`](crate::BatchError::Write) maps to a rollback plus
/// step failure. Partial chunk writes must never be observable outside the
/// sink.
///
/// `write` takes `&self` because chunks from different pooled workers may
/// commit concurrently; implementations needing mutability use interior
/// locking on their own connection/state.
#[async_trait]
pub trait ItemSink: Send + Sync {
  type Item: Send + 'static;

  async fn write(&self, chunk: &[Self::Item]) -> BatchResult<()>;
}

/// A transformer that passes every record through unchanged.
pub struct IdentityTransformer<T> {
  _phantom: PhantomData<fn(T) -> T>,
}

impl<T> IdentityTransformer<T> {
  pub fn new() -> Self {
    Self { _phantom: PhantomData }
  }
}

impl<T> Default for IdentityTransformer<T> {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl<T: Send + 'static> ItemTransformer for IdentityTransformer<T> {
  type Input = T;
  type Output = T;

  async fn transform(&self, item: T) -> BatchResult<Option<T>> {
    Ok(Some(item))
  }
}
