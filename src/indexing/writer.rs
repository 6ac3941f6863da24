//! Index writers and record construction
//!
//! [`IndexRecordFactory`] turns a write request into an [`IndexRecord`]:
//! it deduplicates tokens by `(language, value)`, assigns ids through the
//! shared [`AutoNumber`], caps field lengths and lays out the occurrence
//! metadata in profile order. Concrete [`IndexWriter`]s decide what happens
//! to the records.

use super::auto_number::AutoNumber;
use super::error::{IndexError, IndexResult};
use crate::profile::{FieldLengths, Profile};
use crate::record::{
    IndexRecord, META_LANGUAGE, META_TARGET_ID, OCC_FIELD, OccurrenceEntry, RecordNames,
    TokenEntry,
};
use crate::types::{Metadata, PartitionId, TokenId, Value};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::borrow::Cow;
use std::sync::Arc;

/// Receives tokens produced by partition workers.
///
/// `write` is called concurrently from every partition. `flush(true)` must
/// leave nothing buffered, or fail.
pub trait IndexWriter: Send + Sync {
    fn write(
        &self,
        document_id: &str,
        partition: PartitionId,
        field: &str,
        token: &str,
        metadata: &Metadata,
    ) -> IndexResult<()>;

    fn flush(&self, final_flush: bool) -> IndexResult<()>;

    /// Final flush, performed once. Later calls are no-ops.
    ///
    /// Writes after this fail with `InvalidArgument`. A write that shares a
    /// new token with another writer still in flight may reach the final
    /// flush without that token and fail it with `Consistency`, so writers
    /// should be joined first.
    fn finish(&self) -> IndexResult<()>;
}

/// Adds or overwrites metadata before a record is built.
pub trait MetadataSupplier: Send + Sync {
    fn supply(&self, document_id: &str, field: &str, token: &str, metadata: &mut Metadata);
}

impl<F> MetadataSupplier for F
where
    F: Fn(&str, &str, &str, &mut Metadata) + Send + Sync,
{
    fn supply(&self, document_id: &str, field: &str, token: &str, metadata: &mut Metadata) {
        self(document_id, field, token, metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TokenKey {
    language: String,
    value: String,
}

/// Shared record-building state of a writer.
pub struct IndexRecordFactory {
    tokens: DashMap<TokenKey, TokenId>,
    auto_number: Arc<dyn AutoNumber>,
    names: RecordNames,
    token_lengths: FieldLengths,
    occurrence_lengths: FieldLengths,
    supplier: Option<Arc<dyn MetadataSupplier>>,
}

impl std::fmt::Debug for IndexRecordFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRecordFactory")
            .field("tokens", &self.tokens.len())
            .field("auto_number", &self.auto_number)
            .field("names", &self.names)
            .field("supplier", &self.supplier.is_some())
            .finish()
    }
}

impl IndexRecordFactory {
    pub fn new(profile: &Profile, auto_number: Arc<dyn AutoNumber>) -> Self {
        Self {
            tokens: DashMap::new(),
            auto_number,
            names: profile.record_names(),
            token_lengths: profile.token_lengths().clone(),
            occurrence_lengths: profile.occurrence_lengths().clone(),
            supplier: None,
        }
    }

    pub fn with_supplier(mut self, supplier: Arc<dyn MetadataSupplier>) -> Self {
        self.supplier = Some(supplier);
        self
    }

    pub fn names(&self) -> &RecordNames {
        &self.names
    }

    /// Number of distinct tokens seen so far.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn token_id(&self, language: &str, value: &str) -> Option<TokenId> {
        let key = TokenKey {
            language: language.to_string(),
            value: value.to_string(),
        };
        self.tokens.get(&key).map(|id| *id)
    }

    /// Look up or assign the id of `(language, value)`. The flag tells
    /// whether the id was assigned by this call.
    fn assign(&self, language: &str, value: &str) -> IndexResult<(TokenId, bool)> {
        let key = TokenKey {
            language: language.to_string(),
            value: value.to_string(),
        };
        match self.tokens.entry(key) {
            Entry::Occupied(entry) => Ok((*entry.get(), false)),
            Entry::Vacant(entry) => {
                let id = self
                    .auto_number
                    .next_id()
                    .ok_or(IndexError::IdSpaceExhausted)?;
                entry.insert(id);
                Ok((id, true))
            }
        }
    }

    /// Build the record for one write request.
    pub fn create(
        &self,
        document_id: &str,
        partition: PartitionId,
        field: &str,
        token: &str,
        metadata: &Metadata,
    ) -> IndexResult<IndexRecord> {
        if field.is_empty() {
            return Err(IndexError::InvalidArgument("empty field name".to_string()));
        }
        if token.is_empty() {
            return Err(IndexError::InvalidArgument(format!(
                "empty token for {document_id}.{field}"
            )));
        }

        let metadata: Cow<'_, Metadata> = match &self.supplier {
            Some(supplier) => {
                let mut supplied = metadata.clone();
                supplier.supply(document_id, field, token, &mut supplied);
                Cow::Owned(supplied)
            }
            None => Cow::Borrowed(metadata),
        };

        let language = metadata
            .get(META_LANGUAGE)
            .map(Value::to_text)
            .unwrap_or_default();
        let (id, is_new) = self.assign(&language, token)?;

        let token_entry = is_new.then(|| TokenEntry {
            id,
            value: self.cap_token("value", token.to_string()),
            language: self.cap_token("language", language),
        });

        let target_id = metadata
            .get(META_TARGET_ID)
            .map(Value::to_text)
            .unwrap_or_default();
        let values = self
            .names
            .metadata_names()
            .iter()
            .map(|name| match metadata.get(name) {
                Some(Value::Text(text)) => Value::Text(self.cap_occurrence(name, text.clone())),
                Some(value) => value.clone(),
                None => Value::Null,
            })
            .collect();

        Ok(IndexRecord {
            partition,
            token: token_entry,
            occurrence: OccurrenceEntry {
                token_id: id,
                field: self.cap_occurrence(OCC_FIELD, field.to_string()),
                target_id: self.cap_occurrence(META_TARGET_ID, target_id),
                metadata: values,
            },
        })
    }

    fn cap_token(&self, name: &str, value: String) -> String {
        cap("token", &self.token_lengths, name, value)
    }

    fn cap_occurrence(&self, name: &str, value: String) -> String {
        cap("occurrence", &self.occurrence_lengths, name, value)
    }
}

fn cap(table: &str, lengths: &FieldLengths, name: &str, mut value: String) -> String {
    if let Some(original) = lengths.truncate(name, &mut value) {
        tracing::warn!(
            "[writer] {table}.{name} truncated from {original} chars: {value}"
        );
    }
    value
}
