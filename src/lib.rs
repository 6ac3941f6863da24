//! Concurrent full-text index builder.
//!
//! Rows are read from a data source in partitions, field text is normalized by
//! [`filters`], split by a [`tokenizer`], and written as token and occurrence
//! records through a buffered [`indexing::IndexWriter`] into a
//! [`storage::RecordWriter`].

pub mod config;
pub mod filters;
pub mod indexing;
pub mod logging;
pub mod profile;
pub mod record;
pub mod source;
pub mod storage;
pub mod tokenizer;
pub mod types;

pub use config::Settings;
pub use filters::{FilterChain, TextFilter};
pub use indexing::{
    BufferedIndexWriter, BuildOptions, BuildStats, IndexBuilder, IndexError, IndexRecordFactory,
    IndexResult, IndexWriter, NullIndexWriter, ProgressReport, StandardAutoNumber,
};
pub use profile::{ComponentRegistry, DocumentDefinition, Profile};
pub use record::{IndexRecord, OccurrenceEntry, RecordBatch, TokenEntry};
pub use source::{ConnectionProvider, MemorySource, Row};
pub use storage::{MemoryRecordWriter, RecordWriter, TantivyRecordWriter, TantivyStore};
pub use tokenizer::{StandardTokenizer, Tokenizer};
pub use types::{Metadata, PartitionId, TokenId, Value};
