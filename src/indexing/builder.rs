//! Partitioned, concurrent index building
//!
//! The builder counts a document's rows, splits them into partitions and runs
//! one worker thread per partition. Each worker reads its page of rows,
//! filters and tokenizes every data column and hands the tokens to the shared
//! [`IndexWriter`]. Progress from the workers is funnelled through a channel
//! to the calling thread.

use super::error::{IndexError, IndexResult};
use super::progress::{BuildStats, ProgressReport, ProgressSink, percent};
use super::writer::IndexWriter;
use crate::config::IndexingConfig;
use crate::profile::{DocumentDefinition, FieldPipelines, Profile};
use crate::source::{ConnectionProvider, Row};
use crate::types::{Metadata, PartitionId};
use crate::{debug_event, log_event};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Tunables of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub partition_count: usize,
    /// Documents with fewer rows use a single partition.
    pub min_partition_size: u64,
    /// 0 = no limit.
    pub record_limit: u64,
    /// Rows between worker progress reports; 0 disables them.
    pub progress_interval: u64,
    /// Columns starting with this prefix are metadata. Empty disables
    /// metadata columns.
    pub metadata_prefix: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from(&IndexingConfig::default())
    }
}

impl From<&IndexingConfig> for BuildOptions {
    fn from(config: &IndexingConfig) -> Self {
        Self {
            partition_count: config.partition_count.max(1),
            min_partition_size: config.min_partition_size,
            record_limit: config.record_limit,
            progress_interval: config.progress_interval,
            metadata_prefix: config.metadata_prefix.clone(),
        }
    }
}

/// One partition's slice of the row set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub partition: PartitionId,
    pub offset: u64,
    pub limit: u64,
}

/// How a document's rows are split between workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionPlan {
    pub total: u64,
    pub count: usize,
    /// Rows per partition; the last one may get fewer.
    pub size: u64,
}

impl PartitionPlan {
    pub fn new(total: u64, partition_count: usize, min_partition_size: u64) -> Self {
        let count = if total == 0 || total < min_partition_size {
            1
        } else {
            partition_count.max(1)
        };
        Self {
            total,
            count,
            size: total.div_ceil(count as u64),
        }
    }

    /// Pages in partition order. Limits never reach past `total`.
    pub fn pages(&self) -> Vec<Page> {
        (0..self.count)
            .filter_map(|index| {
                let partition = PartitionId::from_index(index)?;
                let offset = index as u64 * self.size;
                Some(Page {
                    partition,
                    offset,
                    limit: self.size.min(self.total.saturating_sub(offset)),
                })
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PartitionStats {
    rows: u64,
    tokens: u64,
}

struct PartitionJob<'a> {
    document: &'a DocumentDefinition,
    page: Page,
    /// Nominal partition size, the base of progress percentages.
    size: u64,
    pipelines: FieldPipelines,
}

/// Builds the index of profile documents into an [`IndexWriter`].
pub struct IndexBuilder {
    profile: Arc<Profile>,
    connections: Arc<dyn ConnectionProvider>,
    writer: Arc<dyn IndexWriter>,
    options: BuildOptions,
    finished: bool,
}

impl std::fmt::Debug for IndexBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuilder")
            .field("documents", &self.profile.documents().count())
            .field("options", &self.options)
            .field("finished", &self.finished)
            .finish()
    }
}

impl IndexBuilder {
    pub fn new(
        profile: Arc<Profile>,
        connections: Arc<dyn ConnectionProvider>,
        writer: Arc<dyn IndexWriter>,
    ) -> Self {
        Self {
            profile,
            connections,
            writer,
            options: BuildOptions::default(),
            finished: false,
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn writer(&self) -> &Arc<dyn IndexWriter> {
        &self.writer
    }

    /// Index one document.
    ///
    /// Returns after every partition worker settled. The first worker
    /// failure, in partition order, is returned wrapped in
    /// [`IndexError::Partition`]; the other workers are asked to stop.
    pub fn build(
        &self,
        document_id: &str,
        cancel: &CancellationToken,
        progress: Option<&mut dyn ProgressSink>,
    ) -> IndexResult<BuildStats> {
        let mut ignore = |_: ProgressReport| {};
        let sink: &mut dyn ProgressSink = match progress {
            Some(sink) => sink,
            None => &mut ignore,
        };
        self.build_document(document_id, cancel, sink)
    }

    /// Index every profile document in declaration order, with a final
    /// flush after each one.
    pub fn build_all(
        &self,
        cancel: &CancellationToken,
        progress: Option<&mut dyn ProgressSink>,
    ) -> IndexResult<Vec<BuildStats>> {
        let mut ignore = |_: ProgressReport| {};
        let sink: &mut dyn ProgressSink = match progress {
            Some(sink) => sink,
            None => &mut ignore,
        };

        let mut all = Vec::new();
        for document in self.profile.documents() {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            all.push(self.build_document(&document.id, cancel, &mut *sink)?);
            self.writer.flush(true)?;
        }
        Ok(all)
    }

    /// Final flush of the writer. Later calls are no-ops.
    pub fn finish(&mut self) -> IndexResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.writer.finish()
    }

    fn build_document(
        &self,
        document_id: &str,
        cancel: &CancellationToken,
        sink: &mut dyn ProgressSink,
    ) -> IndexResult<BuildStats> {
        let document = self
            .profile
            .document(document_id)
            .ok_or_else(|| IndexError::DocumentNotFound(document_id.to_string()))?;
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let started = Instant::now();

        sink.report(ProgressReport::builder(document_id, 0, "Calculating partitions"));
        let mut total = self.connections.connect()?.count(&document.count_query)?;
        if self.options.record_limit > 0 {
            total = total.min(self.options.record_limit);
        }

        let plan = PartitionPlan::new(
            total,
            self.options.partition_count,
            self.options.min_partition_size,
        );
        sink.report(ProgressReport::builder(
            document_id,
            0,
            format!("Partitions: {}", plan.count),
        ));
        log_event!(
            "builder",
            "partitioned",
            "{document_id}: {total} rows in {} partitions of {}",
            plan.count,
            plan.size
        );

        // Components are resolved up front so profile errors surface before
        // any worker starts. Every partition gets its own instances.
        let mut jobs = Vec::with_capacity(plan.count);
        for page in plan.pages() {
            jobs.push(PartitionJob {
                document,
                page,
                size: plan.size,
                pipelines: FieldPipelines::resolve(document, self.profile.resolver())?,
            });
        }

        let workers = cancel.child_token();
        let (tx, rx) = crossbeam_channel::unbounded();

        let outcomes = std::thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .into_iter()
                .map(|job| {
                    let partition = job.page.partition;
                    let tx = tx.clone();
                    let workers = workers.clone();
                    let handle = scope.spawn(move || {
                        let result = self.run_partition(job, &tx, &workers);
                        if let Err(e) = &result {
                            if !matches!(e, IndexError::Cancelled) {
                                workers.cancel();
                            }
                        }
                        result
                    });
                    (partition, handle)
                })
                .collect();

            drop(tx);
            for report in rx.iter() {
                sink.report(report);
            }

            handles
                .into_iter()
                .map(|(partition, handle)| (partition, handle.join()))
                .collect::<Vec<_>>()
        });

        let mut stats = BuildStats {
            document_id: document_id.to_string(),
            partitions: plan.count,
            total_rows: total,
            ..BuildStats::default()
        };
        let mut failure = None;
        let mut cancelled = false;

        for (partition, outcome) in outcomes {
            match outcome {
                Ok(Ok(partition_stats)) => {
                    stats.rows_processed += partition_stats.rows;
                    stats.tokens_written += partition_stats.tokens;
                }
                Ok(Err(IndexError::Cancelled)) => cancelled = true,
                Ok(Err(e)) => {
                    if failure.is_none() {
                        failure = Some(IndexError::Partition {
                            document: document_id.to_string(),
                            partition,
                            source: Box::new(e),
                        });
                    } else {
                        tracing::warn!("[builder] {partition}.{document_id} also failed: {e}");
                    }
                }
                Err(_) => {
                    if failure.is_none() {
                        failure = Some(IndexError::WorkerPanicked(partition));
                    } else {
                        tracing::warn!("[builder] {partition}.{document_id} also panicked");
                    }
                }
            }
        }

        if let Some(e) = failure {
            tracing::error!("[builder] {document_id} failed: {e}");
            return Err(e);
        }
        if cancelled {
            log_event!("builder", "cancelled", "{document_id}");
            return Err(IndexError::Cancelled);
        }

        stats.elapsed = started.elapsed();
        log_event!(
            "builder",
            "completed",
            "{document_id}: {} rows, {} tokens in {:?}",
            stats.rows_processed,
            stats.tokens_written,
            stats.elapsed
        );
        Ok(stats)
    }

    fn run_partition(
        &self,
        job: PartitionJob<'_>,
        progress: &Sender<ProgressReport>,
        cancel: &CancellationToken,
    ) -> IndexResult<PartitionStats> {
        let document_id = job.document.id.as_str();
        let Page {
            partition,
            offset,
            limit,
        } = job.page;
        let interval = self.options.progress_interval;

        // The receiver outlives every worker.
        let _ = progress.send(ProgressReport::partition(
            document_id,
            partition,
            0,
            "Starting indexer",
        ));
        log_event!(
            "builder",
            "partition started",
            "{partition}.{document_id} offset {offset} limit {limit}"
        );

        let mut connection = self.connections.connect()?;
        let mut cursor = connection.query(&job.document.data_query, offset, limit)?;
        let mut stats = PartitionStats::default();

        loop {
            if cancel.is_cancelled() {
                debug_event!("builder", "partition cancelled", "{partition}.{document_id}");
                return Err(IndexError::Cancelled);
            }
            let Some(row) = cursor.next_row()? else {
                break;
            };

            stats.tokens += self.index_row(document_id, partition, &row, &job.pipelines)?;
            stats.rows += 1;

            if interval > 0 && stats.rows % interval == 0 {
                let _ = progress.send(ProgressReport::partition(
                    document_id,
                    partition,
                    percent(stats.rows, job.size),
                    stats.rows,
                ));
            }
        }

        let _ = progress.send(ProgressReport::partition(
            document_id,
            partition,
            100,
            "Completed indexer",
        ));
        log_event!(
            "builder",
            "partition completed",
            "{partition}.{document_id}: {} rows, {} tokens",
            stats.rows,
            stats.tokens
        );
        Ok(stats)
    }

    /// Write every token of one row. Returns the number of writes.
    fn index_row(
        &self,
        document_id: &str,
        partition: PartitionId,
        row: &Row,
        pipelines: &FieldPipelines,
    ) -> IndexResult<u64> {
        let prefix = self.options.metadata_prefix.as_str();
        let is_metadata = |name: &str| !prefix.is_empty() && name.starts_with(prefix);

        // Metadata first: any field may need any metadata value.
        let mut metadata = Metadata::new();
        for (name, value) in row.columns() {
            if is_metadata(name) && !value.is_null() {
                metadata.insert(name[prefix.len()..].to_string(), value.clone());
            }
        }

        let mut written = 0;
        for (field, value) in row.columns() {
            if is_metadata(field) || value.is_null() {
                continue;
            }

            let mut text = value.to_text();
            pipelines.filter_for(field).apply(&mut text);
            if text.is_empty() {
                continue;
            }

            let multiplier = pipelines.multiplier_for(field);
            for token in pipelines.tokenizer_for(field).tokenize(&text) {
                match multiplier {
                    Some(multiplier) => {
                        for form in multiplier.multiply(&token) {
                            self.writer
                                .write(document_id, partition, field, &form, &metadata)?;
                            written += 1;
                        }
                    }
                    None => {
                        self.writer
                            .write(document_id, partition, field, &token, &metadata)?;
                        written += 1;
                    }
                }
            }
        }
        Ok(written)
    }
}

impl Drop for IndexBuilder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::error!("[builder] final flush on drop failed: {e}");
        }
    }
}
