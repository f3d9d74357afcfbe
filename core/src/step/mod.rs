// chunkflow/src/step/mod.rs

//! Step construction and execution: the builder, the chunk-loop driver for
//! both scheduler modes, and the type-erased runner used by `Flow`.

pub mod builder;
pub mod runner;

pub use builder::{StepBuilder, DEFAULT_CHUNK_SIZE};
pub use runner::Step;
