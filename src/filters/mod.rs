//! Text normalization filters
//!
//! A [`TextFilter`] rewrites a buffer in place. Filters are composed into a
//! [`FilterChain`], which runs them in declaration order and stops as soon as
//! the text becomes empty.
//!
//! ```text
//! "World<sup>12</sup>"  → tag → "World12" → whitespace → "World12" → standard → "world12"
//! ```

pub mod separator;
pub mod smart_quote;
pub mod standard;
pub mod stopword;
pub mod tag;
pub mod whitespace;

pub use separator::SeparatorTextFilter;
pub use smart_quote::SmartQuoteTextFilter;
pub use standard::StandardTextFilter;
pub use stopword::{StopwordOptions, StopwordTextFilter};
pub use tag::TagTextFilter;
pub use whitespace::WhitespaceTextFilter;

use std::fmt;

/// A single normalization step over mutable text.
///
/// Implementations must be total: any input string yields some output string.
/// Instances are resolved fresh for every partition, so they only need to be
/// `Send`.
pub trait TextFilter: Send + fmt::Debug {
    fn apply(&self, text: &mut String);
}

/// Ordered composition of text filters.
#[derive(Debug, Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn TextFilter>>,
}

impl FilterChain {
    /// Create an empty chain, which leaves text untouched.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_filters(filters: Vec<Box<dyn TextFilter>>) -> Self {
        Self { filters }
    }

    /// Append a filter to the end of the chain.
    pub fn with(mut self, filter: impl TextFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn push(&mut self, filter: Box<dyn TextFilter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Apply every filter in order, short-circuiting on empty text.
    pub fn apply(&self, text: &mut String) {
        if text.is_empty() {
            return;
        }
        for filter in &self.filters {
            filter.apply(text);
            if text.is_empty() {
                break;
            }
        }
    }

    /// Convenience wrapper returning the filtered copy of `text`.
    pub fn apply_to(&self, text: &str) -> String {
        let mut buf = text.to_string();
        self.apply(&mut buf);
        buf
    }
}
