use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One indexable data source and its per-field pipeline mapping.
///
/// `data_query` is a template receiving the zero-based row offset as `{0}`
/// and the row limit as `{1}`; substituting them is the connection's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DocumentDefinition {
    pub id: String,
    #[serde(rename = "CountSql")]
    pub count_query: String,
    #[serde(rename = "DataSql")]
    pub data_query: String,
    /// Field code (or `*`) to filter chain id.
    #[serde(default, rename = "TextFilterChains")]
    pub filter_chains: HashMap<String, String>,
    /// Field code (or `*`) to tokenizer id.
    #[serde(default)]
    pub tokenizers: HashMap<String, String>,
    /// Field code (or `*`) to token multiplier id.
    #[serde(default)]
    pub token_multipliers: HashMap<String, String>,
}

impl DocumentDefinition {
    pub fn new(
        id: impl Into<String>,
        count_query: impl Into<String>,
        data_query: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            count_query: count_query.into(),
            data_query: data_query.into(),
            filter_chains: HashMap::new(),
            tokenizers: HashMap::new(),
            token_multipliers: HashMap::new(),
        }
    }

    pub fn with_filter_chain(mut self, field: impl Into<String>, chain: impl Into<String>) -> Self {
        self.filter_chains.insert(field.into(), chain.into());
        self
    }

    pub fn with_tokenizer(mut self, field: impl Into<String>, tokenizer: impl Into<String>) -> Self {
        self.tokenizers.insert(field.into(), tokenizer.into());
        self
    }

    pub fn with_multiplier(
        mut self,
        field: impl Into<String>,
        multiplier: impl Into<String>,
    ) -> Self {
        self.token_multipliers.insert(field.into(), multiplier.into());
        self
    }
}
