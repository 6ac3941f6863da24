//! Token and occurrence records
//!
//! A write request becomes an [`IndexRecord`]: an optional [`TokenEntry`]
//! (present only on the first sighting of a token) plus exactly one
//! [`OccurrenceEntry`]. Records are grouped into a [`RecordBatch`] when handed
//! to a sink.

use crate::types::{PartitionId, TokenId, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metadata key holding a token's language.
pub const META_LANGUAGE: &str = "language";
/// Metadata key holding the id of the source record.
pub const META_TARGET_ID: &str = "target_id";
/// Mandatory occurrence column referencing the token.
pub const OCC_TOKEN_ID: &str = "token_id";
/// Mandatory occurrence column holding the field code.
pub const OCC_FIELD: &str = "field";

/// Occurrence columns every index has, in storage order.
pub const MANDATORY_OCCURRENCE_FIELDS: [&str; 3] = [OCC_TOKEN_ID, OCC_FIELD, META_TARGET_ID];
/// Token columns, in storage order.
pub const TOKEN_FIELDS: [&str; 3] = ["id", "value", "language"];

/// Column names of the token and occurrence tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordNames {
    token: Vec<String>,
    occurrence: Vec<String>,
}

impl RecordNames {
    /// Build names from the profile's metadata fields, which follow the
    /// mandatory occurrence columns.
    pub fn new(metadata_fields: &[String]) -> Self {
        let mut occurrence: Vec<String> = MANDATORY_OCCURRENCE_FIELDS
            .iter()
            .map(|s| s.to_string())
            .collect();
        occurrence.extend(metadata_fields.iter().cloned());
        Self {
            token: TOKEN_FIELDS.iter().map(|s| s.to_string()).collect(),
            occurrence,
        }
    }

    pub fn token_names(&self) -> &[String] {
        &self.token
    }

    pub fn occurrence_names(&self) -> &[String] {
        &self.occurrence
    }

    /// Names of the extra occurrence columns, in declaration order.
    pub fn metadata_names(&self) -> &[String] {
        &self.occurrence[MANDATORY_OCCURRENCE_FIELDS.len()..]
    }
}

/// A unique token row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub id: TokenId,
    pub value: String,
    pub language: String,
}

/// One appearance of a token in a field of a source record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceEntry {
    pub token_id: TokenId,
    pub field: String,
    pub target_id: String,
    /// One value per profile metadata field, in declaration order.
    pub metadata: Vec<Value>,
}

/// A buffered token/occurrence pair produced by one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub partition: PartitionId,
    pub token: Option<TokenEntry>,
    pub occurrence: OccurrenceEntry,
}

impl IndexRecord {
    /// Id of the token the occurrence references.
    pub fn token_id(&self) -> TokenId {
        self.occurrence.token_id
    }

    /// Whether this record introduces its own token row.
    pub fn carries_token(&self) -> bool {
        self.token.is_some()
    }
}

impl fmt::Display for IndexRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(token) = &self.token {
            write!(f, "#{} [{}] {}: ", token.id, token.language, token.value)?;
        }
        write!(
            f,
            ">#{} [{}] => {}",
            self.occurrence.token_id, self.occurrence.field, self.occurrence.target_id
        )
    }
}

/// Rows handed to a sink in one write call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    pub tokens: Vec<TokenEntry>,
    pub occurrences: Vec<OccurrenceEntry>,
}

impl RecordBatch {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.occurrences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len() + self.occurrences.len()
    }
}

impl<'a> FromIterator<&'a IndexRecord> for RecordBatch {
    fn from_iter<I: IntoIterator<Item = &'a IndexRecord>>(iter: I) -> Self {
        let mut batch = RecordBatch::default();
        for record in iter {
            if let Some(token) = &record.token {
                batch.tokens.push(token.clone());
            }
            batch.occurrences.push(record.occurrence.clone());
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32, with_token: bool) -> IndexRecord {
        let token_id = TokenId::new(id).unwrap();
        IndexRecord {
            partition: PartitionId::new(1).unwrap(),
            token: with_token.then(|| TokenEntry {
                id: token_id,
                value: "arco".into(),
                language: "it".into(),
            }),
            occurrence: OccurrenceEntry {
                token_id,
                field: "plttl".into(),
                target_id: "p1".into(),
                metadata: vec![],
            },
        }
    }

    #[test]
    fn test_record_names_order() {
        let names = RecordNames::new(&["rank".to_string(), "year_min".to_string()]);
        assert_eq!(names.token_names(), &["id", "value", "language"]);
        assert_eq!(
            names.occurrence_names(),
            &["token_id", "field", "target_id", "rank", "year_min"]
        );
        assert_eq!(names.metadata_names(), &["rank", "year_min"]);
    }

    #[test]
    fn test_batch_from_records() {
        let records = [record(1, true), record(1, false), record(2, false)];
        let batch: RecordBatch = records.iter().collect();
        assert_eq!(batch.tokens.len(), 1);
        assert_eq!(batch.occurrences.len(), 3);
        assert_eq!(batch.len(), 4);
    }

    #[test]
    fn test_display() {
        assert_eq!(record(7, true).to_string(), "#7 [it] arco: >#7 [plttl] => p1");
        assert_eq!(record(7, false).to_string(), ">#7 [plttl] => p1");
    }
}
