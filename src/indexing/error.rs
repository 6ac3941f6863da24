use crate::profile::ProfileError;
use crate::source::SourceError;
use crate::storage::StorageError;
use crate::types::PartitionId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Token id space exhausted")]
    IdSpaceExhausted,

    #[error("{orphans} occurrences reference tokens that were never written (first: {first})")]
    Consistency { orphans: usize, first: String },

    #[error("Partition {partition} of document '{document}' failed: {source}")]
    Partition {
        document: String,
        partition: PartitionId,
        source: Box<IndexError>,
    },

    #[error("Worker for partition {0} panicked")]
    WorkerPanicked(PartitionId),

    #[error("Indexing cancelled")]
    Cancelled,

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl IndexError {
    /// The failure a partition error wraps, or the error itself.
    pub fn root(&self) -> &IndexError {
        match self {
            IndexError::Partition { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type IndexResult<T> = Result<T, IndexError>;
