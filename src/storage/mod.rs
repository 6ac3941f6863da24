//! Record sinks
//!
//! A [`RecordWriter`] persists token and occurrence batches. Each call either
//! stores the whole batch or fails; partial writes are never reported as
//! success.

pub mod error;
pub mod memory;
pub mod tantivy;

pub use error::{StorageError, StorageResult};
pub use memory::{MemoryRecordWriter, WrittenBatches};
pub use tantivy::{RecordSchema, TantivyRecordWriter, TantivyStore};

use crate::record::RecordBatch;

/// Durable sink for record batches.
pub trait RecordWriter: Send {
    fn write(&mut self, batch: &RecordBatch) -> StorageResult<()>;
}

impl<W: RecordWriter + ?Sized> RecordWriter for Box<W> {
    fn write(&mut self, batch: &RecordBatch) -> StorageResult<()> {
        (**self).write(batch)
    }
}

/// Prepares the token and occurrence tables before a build.
pub trait TableInitializer {
    /// Create the tables if missing; with `clear`, remove existing rows.
    fn initialize(&self, clear: bool) -> StorageResult<()>;
}
