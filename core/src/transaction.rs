// chunkflow/src/transaction.rs

//! The transaction seam wrapping each chunk flush.
//!
//! The step driver begins a transaction, hands the chunk to the sink, then
//! commits on success or rolls back on failure. The transaction handle is
//! exclusively owned by the chunk-unit that began it and is never shared
//! across workers.

use crate::error::BatchResult;
use async_trait::async_trait;

/// A live transaction handle. Consumed by either `commit` or `rollback`;
/// the type system makes forgetting to finish a transaction a dropped
/// handle rather than a dangling one.
#[async_trait]
pub trait Transaction: Send {
  async fn commit(self: Box<Self>) -> BatchResult<()>;

  async fn rollback(self: Box<Self>) -> BatchResult<()>;
}

/// Opens transactions for chunk flushes.
///
/// Implementations bridge to whatever the sink's storage understands
/// (a database transaction, a staged file rename, ...). Sinks that are
/// atomic on their own pair with [`NoopTransactionManager`].
#[async_trait]
pub trait TransactionManager: Send + Sync {
  async fn begin(&self) -> BatchResult<Box<dyn Transaction>>;
}

/// A transaction manager whose begin/commit/rollback are no-ops, for sinks
/// that already persist a whole chunk atomically.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransactionManager;

struct NoopTransaction;

#[async_trait]
impl Transaction for NoopTransaction {
  async fn commit(self: Box<Self>) -> BatchResult<()> {
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> BatchResult<()> {
    Ok(())
  }
}

#[async_trait]
impl TransactionManager for NoopTransactionManager {
  async fn begin(&self) -> BatchResult<Box<dyn Transaction>> {
    Ok(Box::new(NoopTransaction))
  }
}
