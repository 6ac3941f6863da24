use super::{RecordWriter, StorageError, StorageResult};
use crate::record::RecordBatch;
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared view of the batches a [`MemoryRecordWriter`] accepted.
#[derive(Debug, Clone, Default)]
pub struct WrittenBatches(Arc<Mutex<Vec<RecordBatch>>>);

impl WrittenBatches {
    pub fn batches(&self) -> Vec<RecordBatch> {
        self.0.lock().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.0.lock().len()
    }

    pub fn token_count(&self) -> usize {
        self.0.lock().iter().map(|b| b.tokens.len()).sum()
    }

    pub fn occurrence_count(&self) -> usize {
        self.0.lock().iter().map(|b| b.occurrences.len()).sum()
    }

    /// All batches merged into one, in write order.
    pub fn merged(&self) -> RecordBatch {
        let guard = self.0.lock();
        let mut merged = RecordBatch::default();
        for batch in guard.iter() {
            merged.tokens.extend(batch.tokens.iter().cloned());
            merged.occurrences.extend(batch.occurrences.iter().cloned());
        }
        merged
    }
}

/// Sink keeping every batch in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRecordWriter {
    written: WrittenBatches,
    fail_next: usize,
}

impl MemoryRecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` batches.
    pub fn failing(mut self, count: usize) -> Self {
        self.fail_next = count;
        self
    }

    pub fn handle(&self) -> WrittenBatches {
        self.written.clone()
    }
}

impl RecordWriter for MemoryRecordWriter {
    fn write(&mut self, batch: &RecordBatch) -> StorageResult<()> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(StorageError::BatchRejected {
                records: batch.len(),
                reason: "injected failure".to_string(),
            });
        }
        self.written.0.lock().push(batch.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{OccurrenceEntry, TokenEntry};
    use crate::types::TokenId;

    fn batch() -> RecordBatch {
        let id = TokenId::new(1).unwrap();
        RecordBatch {
            tokens: vec![TokenEntry {
                id,
                value: "roma".into(),
                language: String::new(),
            }],
            occurrences: vec![OccurrenceEntry {
                token_id: id,
                field: "plttl".into(),
                target_id: "1".into(),
                metadata: vec![],
            }],
        }
    }

    #[test]
    fn test_records_batches() {
        let mut writer = MemoryRecordWriter::new();
        let handle = writer.handle();
        writer.write(&batch()).unwrap();
        writer.write(&batch()).unwrap();

        assert_eq!(handle.batch_count(), 2);
        assert_eq!(handle.token_count(), 2);
        assert_eq!(handle.merged().occurrences.len(), 2);
    }

    #[test]
    fn test_injected_failures() {
        let mut writer = MemoryRecordWriter::new().failing(1);
        let handle = writer.handle();

        assert!(matches!(
            writer.write(&batch()),
            Err(StorageError::BatchRejected { records: 2, .. })
        ));
        writer.write(&batch()).unwrap();
        assert_eq!(handle.batch_count(), 1);
    }
}
