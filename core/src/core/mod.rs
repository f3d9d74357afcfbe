// chunkflow/src/core/mod.rs

//! Core building blocks: the item-flow traits, the chunk accumulator,
//! execution records, and the shared-state wrapper.

pub mod chunk;
pub mod execution;
pub mod item;
pub mod shared;

pub use chunk::Chunk;
pub use execution::{BatchStatus, JobExecution, StepExecution};
pub use item::{IdentityTransformer, ItemSink, ItemSource, ItemTransformer};
pub use shared::Shared;
