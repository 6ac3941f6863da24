//! Per-field pipeline lookup
//!
//! A field is mapped to its components by exact field code, then by the `*`
//! wildcard, then by a default (identity chain, null tokenizer, no
//! multiplier).

use super::document::DocumentDefinition;
use super::error::ProfileResult;
use super::registry::ComponentResolver;
use crate::filters::FilterChain;
use crate::tokenizer::{NullTokenizer, TokenMultiplier, Tokenizer};
use std::collections::HashMap;

/// Wildcard key matching any field without its own entry.
pub const WILDCARD_FIELD: &str = "*";

/// Find the entry for `field`, falling back to the wildcard entry.
pub fn lookup_field<'a, T>(map: &'a HashMap<String, T>, field: &str) -> Option<&'a T> {
    map.get(field).or_else(|| map.get(WILDCARD_FIELD))
}

/// Live components for every field of one document, owned by one partition.
#[derive(Debug, Default)]
pub struct FieldPipelines {
    chains: HashMap<String, FilterChain>,
    tokenizers: HashMap<String, Box<dyn Tokenizer>>,
    multipliers: HashMap<String, Option<Box<dyn TokenMultiplier>>>,
    identity: FilterChain,
    null_tokenizer: NullTokenizer,
}

impl FieldPipelines {
    /// Resolve fresh component instances for every field mapping of
    /// `document`. An empty or unknown id pins the field to its default
    /// instead of the wildcard entry.
    pub fn resolve(
        document: &DocumentDefinition,
        resolver: &dyn ComponentResolver,
    ) -> ProfileResult<Self> {
        let mut pipelines = Self::default();

        for (field, id) in &document.filter_chains {
            let chain = match resolve_id(id, |id| resolver.resolve_filter_chain(id))? {
                Some(chain) => chain,
                None => {
                    warn_unknown(&document.id, field, "filter chain", id);
                    FilterChain::new()
                }
            };
            pipelines.chains.insert(field.clone(), chain);
        }

        for (field, id) in &document.tokenizers {
            let tokenizer = match resolve_id(id, |id| resolver.resolve_tokenizer(id))? {
                Some(tokenizer) => tokenizer,
                None => {
                    warn_unknown(&document.id, field, "tokenizer", id);
                    Box::new(NullTokenizer::new())
                }
            };
            pipelines.tokenizers.insert(field.clone(), tokenizer);
        }

        for (field, id) in &document.token_multipliers {
            let multiplier = resolve_id(id, |id| resolver.resolve_multiplier(id))?;
            if multiplier.is_none() {
                warn_unknown(&document.id, field, "token multiplier", id);
            }
            pipelines.multipliers.insert(field.clone(), multiplier);
        }

        Ok(pipelines)
    }

    pub fn filter_for(&self, field: &str) -> &FilterChain {
        lookup_field(&self.chains, field).unwrap_or(&self.identity)
    }

    pub fn tokenizer_for(&self, field: &str) -> &dyn Tokenizer {
        match lookup_field(&self.tokenizers, field) {
            Some(tokenizer) => tokenizer.as_ref(),
            None => &self.null_tokenizer,
        }
    }

    pub fn multiplier_for(&self, field: &str) -> Option<&dyn TokenMultiplier> {
        lookup_field(&self.multipliers, field).and_then(|m| m.as_deref())
    }
}

fn resolve_id<T>(
    id: &str,
    resolve: impl FnOnce(&str) -> ProfileResult<Option<T>>,
) -> ProfileResult<Option<T>> {
    if id.is_empty() { Ok(None) } else { resolve(id) }
}

fn warn_unknown(document: &str, field: &str, kind: &str, id: &str) {
    if !id.is_empty() {
        tracing::warn!("[profile] {document}.{field}: unknown {kind} '{id}', using default");
    }
}
