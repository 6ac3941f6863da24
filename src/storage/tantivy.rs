//! Tantivy-backed token and occurrence tables
//!
//! Both tables live in one index and are told apart by the `kind` field.
//! Every batch is added and committed with a single commit, so a batch is
//! either fully visible or not at all.

use super::{RecordWriter, StorageResult, TableInitializer};
use crate::record::{OccurrenceEntry, RecordBatch, TokenEntry};
use crate::types::TokenId;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tantivy::collector::{Count, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::Value as _;
use tantivy::schema::{
    Field, IndexRecordOption, NumericOptions, STORED, STRING, Schema, SchemaBuilder,
};
use tantivy::{
    Index, IndexReader, IndexSettings, IndexWriter, ReloadPolicy, TantivyDocument as Document,
    Term,
};

const KIND_TOKEN: &str = "token";
const KIND_OCCURRENCE: &str = "occurrence";
const WRITER_HEAP_SIZE: usize = 50_000_000;

/// Schema fields shared by token and occurrence documents.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    /// Table discriminator: `token` or `occurrence`.
    pub kind: Field,
    pub token_id: Field,
    pub value: Field,
    pub language: Field,
    pub field: Field,
    pub target_id: Field,
    /// Occurrence metadata values as a JSON array, in profile order.
    pub metadata: Field,
}

impl RecordSchema {
    pub fn build() -> (Schema, Self) {
        let mut builder = SchemaBuilder::default();

        let indexed_u64 = NumericOptions::default()
            .set_indexed()
            .set_stored()
            .set_fast();

        let kind = builder.add_text_field("kind", STRING | STORED);
        let token_id = builder.add_u64_field("token_id", indexed_u64);
        let value = builder.add_text_field("value", STRING | STORED);
        let language = builder.add_text_field("language", STRING | STORED);
        let field = builder.add_text_field("field", STRING | STORED);
        let target_id = builder.add_text_field("target_id", STRING | STORED);
        let metadata = builder.add_text_field("metadata", STORED);

        let schema = builder.build();
        (
            schema,
            Self {
                kind,
                token_id,
                value,
                language,
                field,
                target_id,
                metadata,
            },
        )
    }
}

/// Token and occurrence tables stored in one Tantivy index.
pub struct TantivyStore {
    index: Index,
    reader: IndexReader,
    schema: RecordSchema,
    index_path: PathBuf,
    writer: Mutex<Option<IndexWriter<Document>>>,
}

impl std::fmt::Debug for TantivyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivyStore")
            .field("index_path", &self.index_path)
            .field("schema", &self.schema)
            .finish()
    }
}

impl TantivyStore {
    /// Open the index at `index_path`, creating it when missing.
    pub fn open(index_path: impl AsRef<Path>) -> StorageResult<Self> {
        let index_path = index_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&index_path)?;

        let (schema, record_schema) = RecordSchema::build();
        let existing = index_path.join("meta.json").exists();
        let index = if existing {
            Index::open_in_dir(&index_path)?
        } else {
            let dir = MmapDirectory::open(&index_path)?;
            Index::create(dir, schema, IndexSettings::default())?
        };

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        if existing {
            reader.reload()?;
        }

        tracing::debug!("[storage] opened record index at {}", index_path.display());
        Ok(Self {
            index,
            reader,
            schema: record_schema,
            index_path,
            writer: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.index_path
    }

    /// Add and commit one batch; on any failure the pending changes are
    /// rolled back.
    pub fn write_batch(&self, batch: &RecordBatch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut guard = self.writer.lock();
        let writer = self.ensure_writer(&mut guard)?;

        if let Err(e) = self.add_batch(writer, batch) {
            rollback(writer);
            return Err(e);
        }
        if let Err(e) = writer.commit() {
            rollback(writer);
            return Err(e.into());
        }
        drop(guard);

        self.refresh_reader();
        tracing::debug!(
            "[storage] committed {} tokens, {} occurrences",
            batch.tokens.len(),
            batch.occurrences.len()
        );
        Ok(())
    }

    /// Make committed changes searchable. The commit already succeeded, so a
    /// failed reload only delays visibility until the next one.
    fn refresh_reader(&self) {
        reload_outcome(self.reader.reload(), &self.index_path);
    }

    fn ensure_writer<'a>(
        &self,
        guard: &'a mut Option<IndexWriter<Document>>,
    ) -> StorageResult<&'a mut IndexWriter<Document>> {
        let writer = match guard.take() {
            Some(writer) => writer,
            None => self.index.writer(WRITER_HEAP_SIZE)?,
        };
        Ok(guard.insert(writer))
    }

    fn add_batch(&self, writer: &mut IndexWriter<Document>, batch: &RecordBatch) -> StorageResult<()> {
        let schema = &self.schema;
        for token in &batch.tokens {
            let mut doc = Document::new();
            doc.add_text(schema.kind, KIND_TOKEN);
            doc.add_u64(schema.token_id, u64::from(token.id.value()));
            doc.add_text(schema.value, &token.value);
            doc.add_text(schema.language, &token.language);
            writer.add_document(doc)?;
        }
        for occurrence in &batch.occurrences {
            let mut doc = Document::new();
            doc.add_text(schema.kind, KIND_OCCURRENCE);
            doc.add_u64(schema.token_id, u64::from(occurrence.token_id.value()));
            doc.add_text(schema.field, &occurrence.field);
            doc.add_text(schema.target_id, &occurrence.target_id);
            doc.add_text(schema.metadata, serde_json::to_string(&occurrence.metadata)?);
            writer.add_document(doc)?;
        }
        Ok(())
    }

    pub fn token_count(&self) -> StorageResult<u64> {
        self.count(&self.kind_query(KIND_TOKEN))
    }

    pub fn occurrence_count(&self) -> StorageResult<u64> {
        self.count(&self.kind_query(KIND_OCCURRENCE))
    }

    /// Id of the stored token with this language and value.
    pub fn token_id(&self, language: &str, value: &str) -> StorageResult<Option<TokenId>> {
        let query = BooleanQuery::new(vec![
            (Occur::Must, self.kind_query(KIND_TOKEN)),
            (Occur::Must, self.text_query(self.schema.value, value)),
        ]);
        let tokens = self.search(&query)?;
        Ok(tokens
            .iter()
            .filter_map(|doc| self.token_entry(doc))
            .find(|token| token.language == language)
            .map(|token| token.id))
    }

    /// Every stored token, ordered by id.
    pub fn tokens(&self) -> StorageResult<Vec<TokenEntry>> {
        let docs = self.search(self.kind_query(KIND_TOKEN).as_ref())?;
        let mut tokens: Vec<TokenEntry> = docs.iter().filter_map(|d| self.token_entry(d)).collect();
        tokens.sort_by_key(|t| t.id);
        Ok(tokens)
    }

    /// Occurrences referencing `token_id`, ordered by field then target.
    pub fn occurrences_of(&self, token_id: TokenId) -> StorageResult<Vec<OccurrenceEntry>> {
        let term = Term::from_field_u64(self.schema.token_id, u64::from(token_id.value()));
        let query = BooleanQuery::new(vec![
            (Occur::Must, self.kind_query(KIND_OCCURRENCE)),
            (
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ),
        ]);
        let mut occurrences = Vec::new();
        for doc in self.search(&query)? {
            if let Some(occurrence) = self.occurrence_entry(&doc)? {
                occurrences.push(occurrence);
            }
        }
        occurrences.sort_by(|a, b| {
            a.field
                .cmp(&b.field)
                .then_with(|| a.target_id.cmp(&b.target_id))
        });
        Ok(occurrences)
    }

    fn kind_query(&self, kind: &str) -> Box<dyn Query> {
        self.text_query(self.schema.kind, kind)
    }

    fn text_query(&self, field: Field, text: &str) -> Box<dyn Query> {
        Box::new(TermQuery::new(
            Term::from_field_text(field, text),
            IndexRecordOption::Basic,
        ))
    }

    fn count(&self, query: &dyn Query) -> StorageResult<u64> {
        let searcher = self.reader.searcher();
        Ok(searcher.search(query, &Count)? as u64)
    }

    fn search(&self, query: &dyn Query) -> StorageResult<Vec<Document>> {
        let searcher = self.reader.searcher();
        let hits = searcher.search(query, &Count)?;
        if hits == 0 {
            return Ok(Vec::new());
        }
        let top_docs = searcher.search(query, &TopDocs::with_limit(hits))?;
        let mut docs = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            docs.push(searcher.doc::<Document>(address)?);
        }
        Ok(docs)
    }

    fn token_entry(&self, doc: &Document) -> Option<TokenEntry> {
        Some(TokenEntry {
            id: self.stored_token_id(doc)?,
            value: self.stored_text(doc, self.schema.value),
            language: self.stored_text(doc, self.schema.language),
        })
    }

    fn occurrence_entry(&self, doc: &Document) -> StorageResult<Option<OccurrenceEntry>> {
        let Some(token_id) = self.stored_token_id(doc) else {
            return Ok(None);
        };
        let metadata_json = self.stored_text(doc, self.schema.metadata);
        let metadata = if metadata_json.is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&metadata_json)?
        };
        Ok(Some(OccurrenceEntry {
            token_id,
            field: self.stored_text(doc, self.schema.field),
            target_id: self.stored_text(doc, self.schema.target_id),
            metadata,
        }))
    }

    fn stored_token_id(&self, doc: &Document) -> Option<TokenId> {
        doc.get_first(self.schema.token_id)
            .and_then(|v| v.as_u64())
            .and_then(|id| u32::try_from(id).ok())
            .and_then(TokenId::new)
    }

    fn stored_text(&self, doc: &Document, field: Field) -> String {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

fn reload_outcome(result: tantivy::Result<()>, index_path: &Path) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                "[storage] reader reload failed after commit at {}: {e}",
                index_path.display()
            );
            false
        }
    }
}

fn rollback(writer: &mut IndexWriter<Document>) {
    if let Err(e) = writer.rollback() {
        tracing::error!("[storage] rollback failed: {e}");
    }
}

impl TableInitializer for TantivyStore {
    fn initialize(&self, clear: bool) -> StorageResult<()> {
        if !clear {
            return Ok(());
        }
        let mut guard = self.writer.lock();
        let writer = self.ensure_writer(&mut guard)?;
        writer.delete_all_documents()?;
        writer.commit()?;
        drop(guard);

        self.refresh_reader();
        tracing::info!("[storage] cleared record index at {}", self.index_path.display());
        Ok(())
    }
}

/// [`RecordWriter`] committing each batch to a shared [`TantivyStore`].
#[derive(Debug, Clone)]
pub struct TantivyRecordWriter {
    store: Arc<TantivyStore>,
}

impl TantivyRecordWriter {
    pub fn new(store: Arc<TantivyStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<TantivyStore> {
        &self.store
    }
}

impl RecordWriter for TantivyRecordWriter {
    fn write(&mut self, batch: &RecordBatch) -> StorageResult<()> {
        self.store.write_batch(batch)
    }
}
