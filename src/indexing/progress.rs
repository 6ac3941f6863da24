use crate::types::PartitionId;
use std::time::Duration;

/// A progress update from a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressReport {
    /// 0-100 within the reporting partition, or of the whole build for
    /// builder-level reports.
    pub percent: u8,
    pub message: String,
    /// Partition that produced the report; `None` for builder-level reports.
    pub partition: Option<PartitionId>,
    pub document_id: String,
}

impl ProgressReport {
    pub(crate) fn builder(document_id: &str, percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent,
            message: message.into(),
            partition: None,
            document_id: document_id.to_string(),
        }
    }

    /// Worker report, prefixed `[NNN.document] `.
    pub(crate) fn partition(
        document_id: &str,
        partition: PartitionId,
        percent: u8,
        message: impl std::fmt::Display,
    ) -> Self {
        Self {
            percent,
            message: format!("[{partition}.{document_id}] {message}"),
            partition: Some(partition),
            document_id: document_id.to_string(),
        }
    }
}

/// Receives progress on the thread that runs the build.
pub trait ProgressSink {
    fn report(&mut self, report: ProgressReport);
}

impl<F: FnMut(ProgressReport)> ProgressSink for F {
    fn report(&mut self, report: ProgressReport) {
        self(report)
    }
}

/// Percentage of `done` over `total`, clamped to 100.
pub(crate) fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.saturating_mul(100) / total).min(100) as u8
}

/// Outcome of building one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub document_id: String,
    pub partitions: usize,
    /// Rows reported by the count query, after the record limit.
    pub total_rows: u64,
    pub rows_processed: u64,
    /// Write requests sent to the index writer.
    pub tokens_written: u64,
    pub elapsed: Duration,
}
