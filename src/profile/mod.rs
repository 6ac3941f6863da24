//! Indexing profiles
//!
//! A [`Profile`] holds the document definitions of one build together with
//! the global record settings (metadata columns and field length caps), and
//! the [`ComponentResolver`] used to turn component ids into live filter
//! chains, tokenizers and multipliers.
//!
//! Profiles are usually read from JSON:
//!
//! ```json
//! {
//!   "MetadataFields": ["rank"],
//!   "FilterChains": [{ "Id": "std", "Filters": [{ "Id": "text-filter.standard" }] }],
//!   "Tokenizers": [{ "Id": "words", "TypeId": "string-tokenizer.standard" }],
//!   "Documents": [{ "Id": "place", "CountSql": "...", "DataSql": "...",
//!                   "TextFilterChains": { "*": "std" }, "Tokenizers": { "*": "words" } }]
//! }
//! ```

pub mod document;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use document::DocumentDefinition;
pub use error::{ProfileError, ProfileResult};
pub use pipeline::{FieldPipelines, WILDCARD_FIELD, lookup_field};
pub use registry::{
    CatalogResolver, ComponentRegistry, ComponentResolver, FilterChainSpec, MultiplierSpec,
    TokenizerSpec,
};

use crate::config::Settings;
use crate::record::{MANDATORY_OCCURRENCE_FIELDS, RecordNames};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Maximum character length per column name. Columns without an entry are
/// not capped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldLengths(HashMap<String, usize>);

impl FieldLengths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default caps for the token table: `value` 100, `language` 5.
    pub fn token_defaults() -> Self {
        Self::new().with("value", 100).with("language", 5)
    }

    pub fn with(mut self, name: impl Into<String>, max_len: usize) -> Self {
        self.0.insert(name.into(), max_len);
        self
    }

    pub fn limit(&self, name: &str) -> Option<usize> {
        self.0.get(name).copied()
    }

    /// Cut `value` to the cap of `name`, in characters. Returns the original
    /// length when truncation happened.
    pub fn truncate(&self, name: &str, value: &mut String) -> Option<usize> {
        let max = self.limit(name)?;
        let (cut, _) = value.char_indices().nth(max)?;
        let original = value.chars().count();
        value.truncate(cut);
        Some(original)
    }
}

/// Shape of a profile JSON document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProfileFile {
    #[serde(default)]
    metadata_fields: Vec<String>,
    #[serde(default)]
    token_field_lengths: Option<FieldLengths>,
    #[serde(default)]
    occurrence_field_lengths: FieldLengths,
    #[serde(default)]
    filter_chains: Vec<FilterChainSpec>,
    #[serde(default)]
    tokenizers: Vec<TokenizerSpec>,
    #[serde(default)]
    token_multipliers: Vec<MultiplierSpec>,
    #[serde(default)]
    documents: Vec<DocumentDefinition>,
}

/// Resolved set of document definitions plus global indexing settings.
#[derive(Debug, Clone)]
pub struct Profile {
    documents: IndexMap<String, DocumentDefinition>,
    metadata_fields: Vec<String>,
    token_lengths: FieldLengths,
    occurrence_lengths: FieldLengths,
    resolver: Arc<dyn ComponentResolver>,
}

impl Profile {
    /// Empty profile resolving components through `resolver`.
    pub fn new(resolver: Arc<dyn ComponentResolver>) -> Self {
        Self {
            documents: IndexMap::new(),
            metadata_fields: Vec::new(),
            token_lengths: FieldLengths::token_defaults(),
            occurrence_lengths: FieldLengths::new(),
            resolver,
        }
    }

    /// Parse a profile JSON document, building components with `registry`.
    pub fn from_json_str(json: &str, registry: ComponentRegistry) -> ProfileResult<Self> {
        let file: ProfileFile = serde_json::from_str(json)?;

        let mut catalog = CatalogResolver::new(registry);
        for spec in file.filter_chains {
            catalog = catalog.with_chain(spec);
        }
        for spec in file.tokenizers {
            catalog = catalog.with_tokenizer(spec);
        }
        for spec in file.token_multipliers {
            catalog = catalog.with_multiplier(spec);
        }
        catalog.validate()?;

        let mut profile = Self::new(Arc::new(catalog))
            .with_metadata_fields(file.metadata_fields)?
            .with_occurrence_lengths(file.occurrence_field_lengths);
        if let Some(lengths) = file.token_field_lengths {
            profile = profile.with_token_lengths(lengths);
        }
        for document in file.documents {
            profile = profile.with_document(document)?;
        }

        tracing::debug!(
            "[profile] loaded {} documents, metadata fields {:?}",
            profile.documents.len(),
            profile.metadata_fields
        );
        Ok(profile)
    }

    pub fn from_file(path: impl AsRef<Path>, registry: ComponentRegistry) -> ProfileResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json, registry)
    }

    /// Load the profile named by `profile_path` in the settings.
    pub fn from_settings(settings: &Settings, registry: ComponentRegistry) -> ProfileResult<Self> {
        let path = settings
            .resolved_profile_path()
            .ok_or(ProfileError::NotConfigured)?;
        tracing::debug!("[profile] loading {}", path.display());
        Self::from_file(path, registry)
    }

    /// Add a document definition. Ids must be unique.
    pub fn with_document(mut self, document: DocumentDefinition) -> ProfileResult<Self> {
        if self.documents.contains_key(&document.id) {
            return Err(ProfileError::DuplicateDocument(document.id));
        }
        self.documents.insert(document.id.clone(), document);
        Ok(self)
    }

    /// Set the extra occurrence columns. The mandatory occurrence column
    /// names are rejected.
    pub fn with_metadata_fields<I, S>(mut self, fields: I) -> ProfileResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if let Some(reserved) = fields
            .iter()
            .find(|f| MANDATORY_OCCURRENCE_FIELDS.contains(&f.as_str()))
        {
            return Err(ProfileError::ReservedMetadataField(reserved.clone()));
        }
        self.metadata_fields = fields;
        Ok(self)
    }

    pub fn with_token_lengths(mut self, lengths: FieldLengths) -> Self {
        self.token_lengths = lengths;
        self
    }

    pub fn with_occurrence_lengths(mut self, lengths: FieldLengths) -> Self {
        self.occurrence_lengths = lengths;
        self
    }

    pub fn document(&self, id: &str) -> Option<&DocumentDefinition> {
        self.documents.get(id)
    }

    /// Documents in declaration order.
    pub fn documents(&self) -> impl Iterator<Item = &DocumentDefinition> {
        self.documents.values()
    }

    pub fn metadata_fields(&self) -> &[String] {
        &self.metadata_fields
    }

    pub fn token_lengths(&self) -> &FieldLengths {
        &self.token_lengths
    }

    pub fn occurrence_lengths(&self) -> &FieldLengths {
        &self.occurrence_lengths
    }

    pub fn resolver(&self) -> &dyn ComponentResolver {
        self.resolver.as_ref()
    }

    pub fn record_names(&self) -> RecordNames {
        RecordNames::new(&self.metadata_fields)
    }
}
