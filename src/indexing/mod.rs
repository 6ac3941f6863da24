//! Index building
//!
//! Token ids come from an [`AutoNumber`]; records are built by the
//! [`IndexRecordFactory`] shared by every [`IndexWriter`]; the
//! [`IndexBuilder`] drives one worker per partition of a document.

pub mod auto_number;
pub mod buffered;
pub mod builder;
pub mod error;
pub mod null;
pub mod progress;
pub mod writer;

pub use auto_number::{AutoNumber, StandardAutoNumber};
pub use buffered::{BufferedIndexWriter, DEFAULT_BUFFER_SIZE, FlushStats};
pub use builder::{BuildOptions, IndexBuilder, Page, PartitionPlan};
pub use error::{IndexError, IndexResult};
pub use null::NullIndexWriter;
pub use progress::{BuildStats, ProgressReport, ProgressSink};
pub use writer::{IndexRecordFactory, IndexWriter, MetadataSupplier};
