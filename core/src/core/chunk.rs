// chunkflow/src/core/chunk.rs

//! The chunk accumulator: a bounded, ordered buffer of transformed records.

/// An ordered, bounded buffer of transformed records awaiting flush.
///
/// A chunk exists only transiently between accumulation and flush and is
/// owned exclusively by the chunk-unit filling it. Capacity is the step's
/// configured chunk size; the trailing chunk of a stream may flush with
/// fewer items but is never silently dropped.
#[derive(Debug)]
pub struct Chunk<T> {
  items: Vec<T>,
  capacity: usize,
}

impl<T> Chunk<T> {
  /// Creates an empty chunk. `capacity` must be >= 1; builders validate
  /// this before a chunk is ever constructed.
  pub fn new(capacity: usize) -> Self {
    Self {
      items: Vec::with_capacity(capacity),
      capacity,
    }
  }

  /// Appends a transformed record. Callers check `is_full` first; the
  /// accumulator itself never flushes.
  pub fn push(&mut self, item: T) {
    debug_assert!(self.items.len() < self.capacity);
    self.items.push(item);
  }

  pub fn is_full(&self) -> bool {
    self.items.len() >= self.capacity
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Drains the buffered records for flushing, leaving the chunk empty and
  /// ready to accumulate the next unit.
  pub fn take(&mut self) -> Vec<T> {
    std::mem::replace(&mut self.items, Vec::with_capacity(self.capacity))
  }
}
