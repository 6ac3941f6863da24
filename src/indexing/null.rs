use super::error::IndexResult;
use super::writer::{IndexRecordFactory, IndexWriter};
use crate::types::{Metadata, PartitionId};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Writer that builds and logs records but stores nothing. Used for dry
/// runs of a profile.
#[derive(Debug)]
pub struct NullIndexWriter {
    factory: IndexRecordFactory,
    written: AtomicUsize,
}

impl NullIndexWriter {
    pub fn new(factory: IndexRecordFactory) -> Self {
        Self {
            factory,
            written: AtomicUsize::new(0),
        }
    }

    /// Number of write requests accepted.
    pub fn written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    /// Number of distinct tokens seen.
    pub fn token_count(&self) -> usize {
        self.factory.token_count()
    }
}

impl IndexWriter for NullIndexWriter {
    fn write(
        &self,
        document_id: &str,
        partition: PartitionId,
        field: &str,
        token: &str,
        metadata: &Metadata,
    ) -> IndexResult<()> {
        let record = self
            .factory
            .create(document_id, partition, field, token, metadata)?;
        tracing::debug!("[null-writer] {document_id}.{partition} {record}");
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&self, _final_flush: bool) -> IndexResult<()> {
        Ok(())
    }

    fn finish(&self) -> IndexResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::{IndexError, StandardAutoNumber};
    use crate::profile::{CatalogResolver, Profile};
    use std::sync::Arc;

    #[test]
    fn test_counts_without_storing() {
        let profile = Profile::new(Arc::new(CatalogResolver::default()));
        let writer = NullIndexWriter::new(IndexRecordFactory::new(
            &profile,
            Arc::new(StandardAutoNumber::default()),
        ));
        let partition = PartitionId::new(1).unwrap();
        let metadata = Metadata::new();

        writer.write("d", partition, "f", "roma", &metadata).unwrap();
        writer.write("d", partition, "f", "roma", &metadata).unwrap();
        writer.write("d", partition, "f", "milano", &metadata).unwrap();
        writer.finish().unwrap();

        assert_eq!(writer.written(), 3);
        assert_eq!(writer.token_count(), 2);
        assert!(matches!(
            writer.write("d", partition, "", "roma", &metadata),
            Err(IndexError::InvalidArgument(_))
        ));
    }
}
