//! Component registry and resolver
//!
//! Components are created by type tag through a table of constructor
//! functions. Profiles refer to configured instances by logical id; the
//! [`CatalogResolver`] maps those ids to a type tag plus options and builds a
//! fresh instance on every call.

use super::error::{ProfileError, ProfileResult};
use crate::filters::{
    FilterChain, SeparatorTextFilter, SmartQuoteTextFilter, StandardTextFilter,
    StopwordTextFilter, TagTextFilter, TextFilter, WhitespaceTextFilter,
};
use crate::tokenizer::{
    NullTokenizer, ReverseTokenMultiplier, StandardTokenizer, TokenMultiplier, Tokenizer,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

pub const TAG_FILTER: &str = "text-filter.tag";
pub const WHITESPACE_FILTER: &str = "text-filter.whitespace";
pub const STANDARD_FILTER: &str = "text-filter.standard";
pub const SEPARATOR_FILTER: &str = "text-filter.separator";
pub const SMART_QUOTE_FILTER: &str = "text-filter.smart-quote";
pub const STOPWORD_FILTER: &str = "text-filter.stopword";
pub const STANDARD_TOKENIZER: &str = "string-tokenizer.standard";
pub const NULL_TOKENIZER: &str = "string-tokenizer.null";
pub const REVERSE_MULTIPLIER: &str = "string-token-multiplier.reverse";

pub type Options<'a> = Option<&'a serde_json::Value>;
pub type FilterConstructor = fn(Options<'_>) -> ProfileResult<Box<dyn TextFilter>>;
pub type TokenizerConstructor = fn(Options<'_>) -> ProfileResult<Box<dyn Tokenizer>>;
pub type MultiplierConstructor = fn(Options<'_>) -> ProfileResult<Box<dyn TokenMultiplier>>;

/// Resolves logical component ids to live instances.
///
/// Unknown ids resolve to `Ok(None)`. Every call returns a new instance, so
/// callers may hand them to a single partition without synchronization.
pub trait ComponentResolver: Send + Sync + fmt::Debug {
    fn resolve_filter_chain(&self, id: &str) -> ProfileResult<Option<FilterChain>>;

    fn resolve_tokenizer(&self, id: &str) -> ProfileResult<Option<Box<dyn Tokenizer>>>;

    fn resolve_multiplier(&self, id: &str) -> ProfileResult<Option<Box<dyn TokenMultiplier>>>;
}

/// Deserialize component options, falling back to `T::default()` when absent.
pub fn parse_options<T>(tag: &str, options: Options<'_>) -> ProfileResult<T>
where
    T: DeserializeOwned + Default,
{
    match options {
        None | Some(serde_json::Value::Null) => Ok(T::default()),
        Some(value) => {
            serde_json::from_value(value.clone()).map_err(|e| ProfileError::ComponentOptions {
                tag: tag.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

/// Table of component constructors keyed by type tag.
#[derive(Clone)]
pub struct ComponentRegistry {
    filters: HashMap<String, FilterConstructor>,
    tokenizers: HashMap<String, TokenizerConstructor>,
    multipliers: HashMap<String, MultiplierConstructor>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self
            .filters
            .keys()
            .chain(self.tokenizers.keys())
            .chain(self.multipliers.keys())
            .map(String::as_str)
            .collect();
        tags.sort_unstable();
        f.debug_struct("ComponentRegistry")
            .field("tags", &tags)
            .finish()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ComponentRegistry {
    pub fn empty() -> Self {
        Self {
            filters: HashMap::new(),
            tokenizers: HashMap::new(),
            multipliers: HashMap::new(),
        }
    }

    /// Registry with every built-in filter, tokenizer and multiplier.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_filter(TAG_FILTER, |_| Ok(Box::new(TagTextFilter)));
        registry.register_filter(WHITESPACE_FILTER, |_| Ok(Box::new(WhitespaceTextFilter)));
        registry.register_filter(STANDARD_FILTER, |_| Ok(Box::new(StandardTextFilter)));
        registry.register_filter(SMART_QUOTE_FILTER, |_| Ok(Box::new(SmartQuoteTextFilter)));
        registry.register_filter(SEPARATOR_FILTER, |options| {
            let filter = match options {
                None | Some(serde_json::Value::Null) => SeparatorTextFilter::default(),
                Some(_) => SeparatorTextFilter::from_options(parse_options(
                    SEPARATOR_FILTER,
                    options,
                )?),
            };
            Ok(Box::new(filter))
        });
        registry.register_filter(STOPWORD_FILTER, |options| {
            Ok(Box::new(StopwordTextFilter::new(parse_options(
                STOPWORD_FILTER,
                options,
            )?)))
        });
        registry.register_tokenizer(STANDARD_TOKENIZER, |_| Ok(Box::new(StandardTokenizer::new())));
        registry.register_tokenizer(NULL_TOKENIZER, |_| Ok(Box::new(NullTokenizer::new())));
        registry.register_multiplier(REVERSE_MULTIPLIER, |_| Ok(Box::new(ReverseTokenMultiplier)));
        registry
    }

    pub fn register_filter(&mut self, tag: impl Into<String>, constructor: FilterConstructor) {
        self.filters.insert(tag.into(), constructor);
    }

    pub fn register_tokenizer(&mut self, tag: impl Into<String>, constructor: TokenizerConstructor) {
        self.tokenizers.insert(tag.into(), constructor);
    }

    pub fn register_multiplier(
        &mut self,
        tag: impl Into<String>,
        constructor: MultiplierConstructor,
    ) {
        self.multipliers.insert(tag.into(), constructor);
    }

    pub fn create_filter(
        &self,
        tag: &str,
        options: Options<'_>,
    ) -> ProfileResult<Option<Box<dyn TextFilter>>> {
        self.filters.get(tag).map(|ctor| ctor(options)).transpose()
    }

    pub fn create_tokenizer(
        &self,
        tag: &str,
        options: Options<'_>,
    ) -> ProfileResult<Option<Box<dyn Tokenizer>>> {
        self.tokenizers.get(tag).map(|ctor| ctor(options)).transpose()
    }

    pub fn create_multiplier(
        &self,
        tag: &str,
        options: Options<'_>,
    ) -> ProfileResult<Option<Box<dyn TokenMultiplier>>> {
        self.multipliers.get(tag).map(|ctor| ctor(options)).transpose()
    }
}

/// One filter inside a chain definition. `Id` is the filter type tag.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FilterSpec {
    pub id: String,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FilterChainSpec {
    pub id: String,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TokenizerSpec {
    pub id: String,
    pub type_id: String,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
    /// Logical id of the chain applied to every token.
    #[serde(default)]
    pub filter_chain: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MultiplierSpec {
    pub id: String,
    pub type_id: String,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

/// Resolver over component definitions declared in a profile.
#[derive(Debug, Clone, Default)]
pub struct CatalogResolver {
    registry: ComponentRegistry,
    chains: HashMap<String, FilterChainSpec>,
    tokenizers: HashMap<String, TokenizerSpec>,
    multipliers: HashMap<String, MultiplierSpec>,
}

impl CatalogResolver {
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry,
            chains: HashMap::new(),
            tokenizers: HashMap::new(),
            multipliers: HashMap::new(),
        }
    }

    pub fn with_chain(mut self, spec: FilterChainSpec) -> Self {
        self.chains.insert(spec.id.clone(), spec);
        self
    }

    pub fn with_tokenizer(mut self, spec: TokenizerSpec) -> Self {
        self.tokenizers.insert(spec.id.clone(), spec);
        self
    }

    pub fn with_multiplier(mut self, spec: MultiplierSpec) -> Self {
        self.multipliers.insert(spec.id.clone(), spec);
        self
    }

    /// Build every declared component once, surfacing bad tags and options
    /// before any indexing starts.
    pub fn validate(&self) -> ProfileResult<()> {
        for id in self.chains.keys() {
            self.resolve_filter_chain(id)?;
        }
        for id in self.tokenizers.keys() {
            self.resolve_tokenizer(id)?;
        }
        for id in self.multipliers.keys() {
            self.resolve_multiplier(id)?;
        }
        Ok(())
    }
}

impl ComponentResolver for CatalogResolver {
    fn resolve_filter_chain(&self, id: &str) -> ProfileResult<Option<FilterChain>> {
        let Some(spec) = self.chains.get(id) else {
            return Ok(None);
        };
        let mut chain = FilterChain::new();
        for filter in &spec.filters {
            let created = self
                .registry
                .create_filter(&filter.id, filter.options.as_ref())?
                .ok_or_else(|| ProfileError::UnknownComponentType {
                    tag: filter.id.clone(),
                    referenced_by: spec.id.clone(),
                })?;
            chain.push(created);
        }
        Ok(Some(chain))
    }

    fn resolve_tokenizer(&self, id: &str) -> ProfileResult<Option<Box<dyn Tokenizer>>> {
        let Some(spec) = self.tokenizers.get(id) else {
            return Ok(None);
        };
        let mut tokenizer = self
            .registry
            .create_tokenizer(&spec.type_id, spec.options.as_ref())?
            .ok_or_else(|| ProfileError::UnknownComponentType {
                tag: spec.type_id.clone(),
                referenced_by: spec.id.clone(),
            })?;
        if let Some(chain_id) = spec.filter_chain.as_deref().filter(|id| !id.is_empty()) {
            match self.resolve_filter_chain(chain_id)? {
                Some(chain) => tokenizer.set_filter(chain),
                None => tracing::warn!(
                    "[profile] tokenizer '{}' references unknown filter chain '{chain_id}'",
                    spec.id
                ),
            }
        }
        Ok(Some(tokenizer))
    }

    fn resolve_multiplier(&self, id: &str) -> ProfileResult<Option<Box<dyn TokenMultiplier>>> {
        let Some(spec) = self.multipliers.get(id) else {
            return Ok(None);
        };
        self.registry
            .create_multiplier(&spec.type_id, spec.options.as_ref())?
            .ok_or_else(|| ProfileError::UnknownComponentType {
                tag: spec.type_id.clone(),
                referenced_by: spec.id.clone(),
            })
            .map(Some)
    }
}
