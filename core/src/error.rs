// chunkflow/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// The engine's error taxonomy. The three data-path variants (`Read`,
/// `Process`, `Write`) are fatal-by-default: any of them aborts the owning
/// step, and a failed step aborts the remaining flow. `Configuration` is
/// raised by builders before any record flows.
#[derive(Debug, Error)]
pub enum BatchError {
  #[error("Failed to read record at offset {offset}. Source: {source}")]
  Read {
    /// Position of the failing record in the underlying medium
    /// (for flat files: the 1-based line number, header included).
    offset: u64,
    #[source]
    source: AnyhowError,
  },

  #[error("Failed to transform record. Source: {source}")]
  Process {
    #[source]
    source: AnyhowError,
  },

  #[error("Failed to write chunk of {len} records. Source: {source}")]
  Write {
    /// Number of records in the chunk whose flush failed.
    len: usize,
    #[source]
    source: AnyhowError,
  },

  #[error("Configuration error for '{scope}': {message}")]
  Configuration { scope: String, message: String },

  #[error("Internal engine error: {0}")]
  Internal(String),
}

impl BatchError {
  /// Wraps a cause as a `Read` error at the given record offset.
  pub fn read(offset: u64, source: impl Into<AnyhowError>) -> Self {
    BatchError::Read {
      offset,
      source: source.into(),
    }
  }

  /// Wraps a cause as a `Process` error.
  pub fn process(source: impl Into<AnyhowError>) -> Self {
    BatchError::Process {
      source: source.into(),
    }
  }

  /// Wraps a cause as a `Write` error for a chunk of `len` records.
  pub fn write(len: usize, source: impl Into<AnyhowError>) -> Self {
    BatchError::Write {
      len,
      source: source.into(),
    }
  }

  pub fn configuration(scope: impl Into<String>, message: impl Into<String>) -> Self {
    BatchError::Configuration {
      scope: scope.into(),
      message: message.into(),
    }
  }
}

pub type BatchResult<T, E = BatchError> = std::result::Result<T, E>;
