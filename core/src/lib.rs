// src/lib.rs

//! Chunkflow: an async, chunk-oriented batch processing engine for Rust.
//!
//! Chunkflow moves a bounded or streaming set of records from an
//! [`ItemSource`] through an [`ItemTransformer`] into an [`ItemSink`],
//! committing progress in fixed-size chunks under explicit transactional
//! boundaries:
//!  - One chunk is flushed in exactly one transaction; a rolled-back
//!    chunk's items never count as written.
//!  - Steps compose source + transformer + sink + accumulator + transaction
//!    coordination into one bounded unit of work.
//!  - Jobs drive an ordered flow of steps, fail-fast.
//!  - Chunk iterations run sequentially or across a bounded worker pool
//!    ([`ExecutionScheduler`]).
//!  - An [`ExecutionLedger`] records job/step status and progress at every
//!    transition and chunk commit.
//!  - A flat-file source with header skipping and named-field tokenization
//!    covers the delimited-text default ([`FlatFileSource`]).

pub mod core;
pub mod error;
pub mod flat_file;
pub mod job;
pub mod ledger;
pub mod scheduler;
pub mod step;
pub mod transaction;

// --- Re-exports for the Public API ---

// Core types that users will interact with frequently
pub use crate::core::chunk::Chunk;
pub use crate::core::execution::{BatchStatus, JobExecution, StepExecution};
pub use crate::core::item::{IdentityTransformer, ItemSink, ItemSource, ItemTransformer};
pub use crate::core::shared::Shared;

pub use crate::error::{BatchError, BatchResult};

pub use crate::flat_file::{DelimitedLineTokenizer, FieldSet, FlatFileSource};
pub use crate::job::{CancelToken, Flow, Job, JobBuilder};
pub use crate::ledger::{ExecutionLedger, InMemoryLedger};
pub use crate::scheduler::ExecutionScheduler;
pub use crate::step::{Step, StepBuilder, DEFAULT_CHUNK_SIZE};
pub use crate::transaction::{NoopTransactionManager, Transaction, TransactionManager};

/*
    Core Workflow:
    1. Implement `ItemSource`, `ItemTransformer` (or use `IdentityTransformer`)
       and `ItemSink` for your record types.
    2. Build a step: `StepBuilder::new("import").chunk_size(10)
       .worker_pool_size(4).build(source, transformer, sink)?`.
    3. Compose a flow: `Flow::new("import-flow").step(step)`.
    4. Build the job: `JobBuilder::new("import").ledger(ledger).start(flow)?`.
    5. `job.run().await` yields a terminal `JobExecution` with per-step
       read/write/filter counts, timestamps, and the root cause on failure.
*/
