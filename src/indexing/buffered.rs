//! Buffered index writer
//!
//! Records are queued per partition and handed to the sink in batches. An
//! occurrence is only flushed when its token is already saved or travels in
//! the same batch:
//!
//! ```text
//! partition 1: [#1 roma] [>#1] [>#2]      saved: {}
//!                  │       │     └─ #2 not saved, not in batch → requeued
//!                  └───────┴─ batch { tokens: #1, occurrences: >#1 >#1 }
//! ```
//!
//! Flushes are serialized by one lock; `add` from other partitions only
//! touches their own queue.

use super::error::{IndexError, IndexResult};
use super::writer::{IndexRecordFactory, IndexWriter};
use crate::config::IndexingConfig;
use crate::record::{IndexRecord, RecordBatch};
use crate::storage::RecordWriter;
use crate::types::{Metadata, PartitionId, TokenId};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub const DEFAULT_BUFFER_SIZE: usize = 100;

type Queue = Arc<Mutex<VecDeque<IndexRecord>>>;

/// Totals of what reached the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub batches: usize,
    pub tokens: usize,
    pub occurrences: usize,
}

struct FlushState {
    sink: Box<dyn RecordWriter>,
    /// Ids of tokens the sink has accepted. Never shrinks.
    saved: HashSet<TokenId>,
    stats: FlushStats,
}

impl FlushState {
    fn write(&mut self, batch: &RecordBatch) -> IndexResult<()> {
        self.sink.write(batch)?;
        self.saved.extend(batch.tokens.iter().map(|t| t.id));
        self.stats.batches += 1;
        self.stats.tokens += batch.tokens.len();
        self.stats.occurrences += batch.occurrences.len();
        Ok(())
    }
}

/// Writer buffering records per partition and flushing them in
/// token-before-occurrence order.
pub struct BufferedIndexWriter {
    factory: IndexRecordFactory,
    buffers: DashMap<PartitionId, Queue>,
    state: Mutex<FlushState>,
    buffer_size: usize,
    finished: AtomicBool,
}

impl std::fmt::Debug for BufferedIndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedIndexWriter")
            .field("factory", &self.factory)
            .field("partitions", &self.buffers.len())
            .field("buffer_size", &self.buffer_size)
            .field("finished", &self.finished.load(Ordering::SeqCst))
            .finish()
    }
}

impl BufferedIndexWriter {
    pub fn new(factory: IndexRecordFactory, sink: Box<dyn RecordWriter>) -> Self {
        Self {
            factory,
            buffers: DashMap::new(),
            state: Mutex::new(FlushState {
                sink,
                saved: HashSet::new(),
                stats: FlushStats::default(),
            }),
            buffer_size: DEFAULT_BUFFER_SIZE,
            finished: AtomicBool::new(false),
        }
    }

    /// Writer with the buffer size taken from the indexing settings.
    pub fn from_config(
        factory: IndexRecordFactory,
        sink: Box<dyn RecordWriter>,
        config: &IndexingConfig,
    ) -> Self {
        Self::new(factory, sink).with_buffer_size(config.buffer_size)
    }

    /// Queue length that triggers a partition flush (minimum 1).
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn factory(&self) -> &IndexRecordFactory {
        &self.factory
    }

    pub fn stats(&self) -> FlushStats {
        self.state.lock().stats
    }

    pub fn is_saved(&self, id: TokenId) -> bool {
        self.state.lock().saved.contains(&id)
    }

    /// Records still waiting in any partition queue.
    pub fn pending(&self) -> usize {
        self.queues().iter().map(|(_, q)| q.lock().len()).sum()
    }

    fn queue(&self, partition: PartitionId) -> Queue {
        Arc::clone(self.buffers.entry(partition).or_default().value())
    }

    /// Queues ordered by partition.
    fn queues(&self) -> Vec<(PartitionId, Queue)> {
        let mut queues: Vec<(PartitionId, Queue)> = self
            .buffers
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        queues.sort_by_key(|(partition, _)| *partition);
        queues
    }

    /// Append a record to its partition queue, flushing the queue once it
    /// reaches the buffer size.
    ///
    /// Fails once [`IndexWriter::finish`] has started. The flag is checked
    /// under the queue lock, and `finish` raises it before the final flush
    /// locks the queues, so an accepted record is never left behind.
    pub fn add(&self, record: IndexRecord) -> IndexResult<()> {
        let partition = record.partition;
        let len = {
            let queue = self.queue(partition);
            let mut queue = queue.lock();
            if self.finished.load(Ordering::SeqCst) {
                return Err(write_after_finish());
            }
            queue.push_back(record);
            queue.len()
        };
        if len >= self.buffer_size {
            self.flush_partition(partition)?;
        }
        Ok(())
    }

    /// Flush the eligible records of one partition. Returns the number of
    /// records handed to the sink.
    pub fn flush_partition(&self, partition: PartitionId) -> IndexResult<usize> {
        let Some(queue) = self.buffers.get(&partition).map(|q| Arc::clone(q.value())) else {
            return Ok(0);
        };

        let mut state = self.state.lock();
        let mut queue = queue.lock();

        let mut limit = queue.len();
        let mut accepted: Vec<IndexRecord> = Vec::with_capacity(limit);
        let mut batch_tokens: HashSet<TokenId> = HashSet::new();
        while accepted.len() < limit {
            let Some(record) = queue.pop_front() else {
                break;
            };
            let id = record.token_id();
            if record.carries_token() {
                batch_tokens.insert(id);
                accepted.push(record);
            } else if state.saved.contains(&id) || batch_tokens.contains(&id) {
                accepted.push(record);
            } else {
                queue.push_back(record);
                limit -= 1;
            }
        }

        if accepted.is_empty() {
            return Ok(0);
        }

        let batch: RecordBatch = accepted.iter().collect();
        if let Err(e) = state.write(&batch) {
            for record in accepted.into_iter().rev() {
                queue.push_front(record);
            }
            tracing::error!("[writer] flush of partition {partition} failed: {e}");
            return Err(e);
        }

        tracing::debug!(
            "[writer] partition {partition} flushed {} tokens, {} occurrences, {} deferred",
            batch.tokens.len(),
            batch.occurrences.len(),
            queue.len()
        );
        Ok(accepted.len())
    }

    /// Flush every queue in one batch. Entries whose token is neither saved
    /// nor carried by any queued record stay queued and fail the flush.
    fn flush_final(&self) -> IndexResult<usize> {
        let mut state = self.state.lock();
        let queues = self.queues();
        let mut guards: Vec<_> = queues.iter().map(|(_, q)| q.lock()).collect();

        let queued_tokens: HashSet<TokenId> = guards
            .iter()
            .flat_map(|q| q.iter())
            .filter(|r| r.carries_token())
            .map(IndexRecord::token_id)
            .collect();

        let mut accepted: Vec<Vec<IndexRecord>> = Vec::with_capacity(guards.len());
        for queue in guards.iter_mut() {
            let (take, keep): (VecDeque<IndexRecord>, VecDeque<IndexRecord>) =
                queue.drain(..).partition(|r| {
                    let id = r.token_id();
                    r.carries_token() || state.saved.contains(&id) || queued_tokens.contains(&id)
                });
            **queue = keep;
            accepted.push(take.into_iter().collect());
        }

        let batch: RecordBatch = accepted.iter().flatten().collect();
        if !batch.is_empty() {
            if let Err(e) = state.write(&batch) {
                for (queue, records) in guards.iter_mut().zip(accepted) {
                    for record in records.into_iter().rev() {
                        queue.push_front(record);
                    }
                }
                tracing::error!("[writer] final flush failed: {e}");
                return Err(e);
            }
        }

        let orphans: usize = guards.iter().map(|q| q.len()).sum();
        if orphans > 0 {
            let first = guards
                .iter()
                .find_map(|q| q.front())
                .map(ToString::to_string)
                .unwrap_or_default();
            tracing::error!("[writer] {orphans} orphan occurrences after final flush");
            return Err(IndexError::Consistency { orphans, first });
        }

        tracing::info!(
            "[writer] final flush wrote {} tokens, {} occurrences",
            batch.tokens.len(),
            batch.occurrences.len()
        );
        Ok(batch.len())
    }
}

impl IndexWriter for BufferedIndexWriter {
    fn write(
        &self,
        document_id: &str,
        partition: PartitionId,
        field: &str,
        token: &str,
        metadata: &Metadata,
    ) -> IndexResult<()> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(write_after_finish());
        }
        let record = self
            .factory
            .create(document_id, partition, field, token, metadata)?;
        tracing::debug!("[writer] {document_id}.{partition} {record}");
        self.add(record)
    }

    fn flush(&self, final_flush: bool) -> IndexResult<()> {
        if final_flush {
            self.flush_final()?;
        } else {
            for (partition, _) in self.queues() {
                self.flush_partition(partition)?;
            }
        }
        Ok(())
    }

    fn finish(&self) -> IndexResult<()> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.flush(true)
    }
}

fn write_after_finish() -> IndexError {
    IndexError::InvalidArgument("write after the writer was finished".to_string())
}

impl Drop for BufferedIndexWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::error!("[writer] final flush on drop failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::auto_number::StandardAutoNumber;
    use crate::profile::{CatalogResolver, Profile};
    use crate::record::{OccurrenceEntry, TokenEntry};
    use crate::storage::{MemoryRecordWriter, WrittenBatches};

    fn factory() -> IndexRecordFactory {
        let profile = Profile::new(Arc::new(CatalogResolver::default()));
        IndexRecordFactory::new(&profile, Arc::new(StandardAutoNumber::default()))
    }

    fn writer(sink: MemoryRecordWriter, buffer_size: usize) -> (BufferedIndexWriter, WrittenBatches) {
        let handle = sink.handle();
        let writer = BufferedIndexWriter::new(factory(), Box::new(sink)).with_buffer_size(buffer_size);
        (writer, handle)
    }

    fn p(n: u32) -> PartitionId {
        PartitionId::new(n).unwrap()
    }

    fn id(n: u32) -> TokenId {
        TokenId::new(n).unwrap()
    }

    fn record(partition: u32, token: u32, with_token: bool) -> IndexRecord {
        IndexRecord {
            partition: p(partition),
            token: with_token.then(|| TokenEntry {
                id: id(token),
                value: format!("t{token}"),
                language: String::new(),
            }),
            occurrence: OccurrenceEntry {
                token_id: id(token),
                field: "f".into(),
                target_id: "1".into(),
                metadata: vec![],
            },
        }
    }

    /// No occurrence may reach the sink before its token.
    fn assert_ordering(handle: &WrittenBatches) {
        let mut saved = HashSet::new();
        for batch in handle.batches() {
            let in_batch: HashSet<TokenId> = batch.tokens.iter().map(|t| t.id).collect();
            for occurrence in &batch.occurrences {
                assert!(
                    saved.contains(&occurrence.token_id) || in_batch.contains(&occurrence.token_id),
                    "orphan occurrence for #{}",
                    occurrence.token_id
                );
            }
            saved.extend(in_batch);
        }
    }

    #[test]
    fn test_deferred_until_token_saved() {
        let (writer, handle) = writer(MemoryRecordWriter::new(), 1000);
        // Partition 2 references a token first sighted in partition 1.
        writer.add(record(2, 1, false)).unwrap();
        writer.add(record(1, 1, true)).unwrap();

        assert_eq!(writer.flush_partition(p(2)).unwrap(), 0);
        assert_eq!(handle.batch_count(), 0);

        assert_eq!(writer.flush_partition(p(1)).unwrap(), 1);
        assert!(writer.is_saved(id(1)));

        assert_eq!(writer.flush_partition(p(2)).unwrap(), 1);
        assert_eq!(writer.pending(), 0);
        assert_ordering(&handle);
    }

    #[test]
    fn test_same_batch_token_accepts_followers() {
        let (writer, handle) = writer(MemoryRecordWriter::new(), 1000);
        writer.add(record(1, 1, true)).unwrap();
        writer.add(record(1, 1, false)).unwrap();
        writer.add(record(1, 2, false)).unwrap();
        writer.add(record(1, 1, false)).unwrap();

        assert_eq!(writer.flush_partition(p(1)).unwrap(), 3);
        let batches = handle.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].tokens.len(), 1);
        assert_eq!(batches[0].occurrences.len(), 3);
        // The orphan for #2 stays queued.
        assert_eq!(writer.pending(), 1);
    }

    #[test]
    fn test_threshold_triggers_flush() {
        let (writer, handle) = writer(MemoryRecordWriter::new(), 3);
        writer.add(record(1, 1, true)).unwrap();
        writer.add(record(1, 1, false)).unwrap();
        assert_eq!(handle.batch_count(), 0);

        writer.add(record(1, 2, true)).unwrap();
        assert_eq!(handle.batch_count(), 1);
        assert_eq!(writer.pending(), 0);
    }

    #[test]
    fn test_final_flush_co_commits_tokens() {
        let (writer, handle) = writer(MemoryRecordWriter::new(), 1000);
        // Tokens first sighted in one partition, referenced from another.
        writer.add(record(2, 1, false)).unwrap();
        writer.add(record(2, 2, false)).unwrap();
        writer.add(record(1, 1, true)).unwrap();
        writer.add(record(1, 2, true)).unwrap();
        writer.add(record(1, 3, true)).unwrap();
        writer.add(record(2, 3, false)).unwrap();

        writer.flush(true).unwrap();

        let batches = handle.batches();
        assert_eq!(batches.len(), 1);
        let tokens: HashSet<TokenId> = batches[0].tokens.iter().map(|t| t.id).collect();
        assert_eq!(tokens, HashSet::from([id(1), id(2), id(3)]));
        assert_eq!(batches[0].occurrences.len(), 6);
        assert_ordering(&handle);
    }

    #[test]
    fn test_final_flush_reports_orphans() {
        let (writer, handle) = writer(MemoryRecordWriter::new(), 1000);
        writer.add(record(1, 1, true)).unwrap();
        writer.add(record(1, 9, false)).unwrap();

        let err = writer.flush(true).unwrap_err();
        assert!(matches!(err, IndexError::Consistency { orphans: 1, .. }));
        assert_eq!(handle.occurrence_count(), 1);
        // The orphan is kept, not dropped.
        assert_eq!(writer.pending(), 1);
        assert_ordering(&handle);
    }

    #[test]
    fn test_sink_failure_requeues_in_order() {
        let (writer, handle) = writer(MemoryRecordWriter::new().failing(1), 1000);
        writer.add(record(1, 1, true)).unwrap();
        writer.add(record(1, 1, false)).unwrap();

        assert!(matches!(
            writer.flush_partition(p(1)),
            Err(IndexError::Storage(_))
        ));
        assert!(!writer.is_saved(id(1)));
        assert_eq!(writer.pending(), 2);

        assert_eq!(writer.flush_partition(p(1)).unwrap(), 2);
        let batches = handle.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].tokens.len(), 1);
        assert!(writer.is_saved(id(1)));
    }

    #[test]
    fn test_final_flush_failure_keeps_entries() {
        let (writer, handle) = writer(MemoryRecordWriter::new().failing(1), 1000);
        // Partition 2 can only be flushed together with partition 1's tokens.
        writer.add(record(2, 1, false)).unwrap();
        writer.add(record(1, 1, true)).unwrap();
        writer.add(record(1, 2, true)).unwrap();
        writer.add(record(2, 2, false)).unwrap();

        assert!(matches!(writer.flush(true), Err(IndexError::Storage(_))));
        assert_eq!(handle.batch_count(), 0);
        assert_eq!(writer.pending(), 4);
        assert!(!writer.is_saved(id(1)));
        assert!(!writer.is_saved(id(2)));
        assert_eq!(writer.stats(), FlushStats::default());

        writer.flush(true).unwrap();
        let batches = handle.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].tokens.len(), 2);
        assert_eq!(batches[0].occurrences.len(), 4);
        assert!(writer.is_saved(id(1)) && writer.is_saved(id(2)));
        assert_eq!(writer.pending(), 0);
        assert_ordering(&handle);
    }

    #[test]
    fn test_add_after_finish_rejected() {
        let (writer, handle) = writer(MemoryRecordWriter::new(), 1000);
        writer.add(record(1, 1, true)).unwrap();
        writer.finish().unwrap();

        assert!(matches!(
            writer.add(record(1, 1, false)),
            Err(IndexError::InvalidArgument(_))
        ));
        assert_eq!(writer.pending(), 0);
        assert_eq!(handle.occurrence_count(), 1);
    }

    #[test]
    fn test_writes_racing_finish_are_flushed_or_rejected() {
        let (writer, handle) = writer(MemoryRecordWriter::new(), 1000);
        let accepted = std::sync::atomic::AtomicUsize::new(0);

        std::thread::scope(|s| {
            for n in 1..=3u32 {
                let writer = &writer;
                let accepted = &accepted;
                s.spawn(move || {
                    let metadata = Metadata::new();
                    for i in 0..500 {
                        let token = format!("w{n}-{}", i % 40);
                        match writer.write("d", p(n), "f", &token, &metadata) {
                            Ok(()) => {
                                accepted.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(IndexError::InvalidArgument(_)) => break,
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                });
            }
            s.spawn(|| {
                std::thread::yield_now();
                writer.finish().unwrap();
            });
        });

        // Anything accepted after the final flush would still be queued.
        assert_eq!(writer.pending(), 0);
        assert_eq!(handle.occurrence_count(), accepted.load(Ordering::SeqCst));
        assert_ordering(&handle);
    }

    #[test]
    fn test_buffer_size_from_config() {
        let config = IndexingConfig {
            buffer_size: 2,
            ..IndexingConfig::default()
        };
        let sink = MemoryRecordWriter::new();
        let handle = sink.handle();
        let writer = BufferedIndexWriter::from_config(factory(), Box::new(sink), &config);

        writer.add(record(1, 1, true)).unwrap();
        assert_eq!(handle.batch_count(), 0);
        writer.add(record(1, 1, false)).unwrap();
        assert_eq!(handle.batch_count(), 1);
        assert_eq!(writer.pending(), 0);
    }

    #[test]
    fn test_finish_runs_once() {
        let (writer, handle) = writer(MemoryRecordWriter::new(), 1000);
        let metadata = Metadata::new();
        writer.write("d", p(1), "f", "roma", &metadata).unwrap();
        writer.write("d", p(2), "f", "roma", &metadata).unwrap();

        writer.finish().unwrap();
        writer.finish().unwrap();
        assert_eq!(handle.batch_count(), 1);
        assert_eq!(writer.stats(), FlushStats { batches: 1, tokens: 1, occurrences: 2 });

        assert!(matches!(
            writer.write("d", p(1), "f", "roma", &metadata),
            Err(IndexError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_drop_flushes() {
        let (writer, handle) = writer(MemoryRecordWriter::new(), 1000);
        writer.write("d", p(1), "f", "roma", &Metadata::new()).unwrap();
        drop(writer);
        assert_eq!(handle.token_count(), 1);
    }

    #[test]
    fn test_concurrent_partitions_keep_ordering() {
        let (writer, handle) = writer(MemoryRecordWriter::new(), 7);
        let words: Vec<String> = (0..50).map(|i| format!("w{i}")).collect();

        std::thread::scope(|s| {
            for n in 1..=4u32 {
                let writer = &writer;
                let words = &words;
                s.spawn(move || {
                    let metadata = Metadata::new();
                    // Each partition walks the words from a different offset.
                    for i in 0..words.len() {
                        let word = &words[(i + n as usize * 13) % words.len()];
                        writer.write("d", p(n), "f", word, &metadata).unwrap();
                    }
                });
            }
        });
        writer.finish().unwrap();

        assert_eq!(handle.token_count(), 50);
        assert_eq!(handle.occurrence_count(), 200);
        assert_eq!(writer.pending(), 0);
        assert_ordering(&handle);
    }
}
