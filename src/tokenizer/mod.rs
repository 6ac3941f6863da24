//! Tokenizers and token multipliers
//!
//! A [`Tokenizer`] turns filtered field text into a lazy sequence of tokens,
//! optionally running a token-level [`FilterChain`] over each one. A
//! [`TokenMultiplier`] expands a single token into related forms.

pub mod multiplier;
pub mod null;
pub mod standard;

pub use multiplier::{ReverseTokenMultiplier, TokenMultiplier};
pub use null::NullTokenizer;
pub use standard::StandardTokenizer;

use crate::filters::FilterChain;
use std::fmt;

/// Lazy token sequence borrowed from a tokenizer and its input.
pub type Tokens<'a> = Box<dyn Iterator<Item = String> + 'a>;

/// Splits text into tokens.
///
/// Every call to [`Tokenizer::tokenize`] starts a fresh sequence. Empty tokens
/// (after the token filter) are never yielded.
pub trait Tokenizer: Send + fmt::Debug {
    fn tokenize<'a>(&'a self, text: &'a str) -> Tokens<'a>;

    /// Install the filter chain applied to each token before it is yielded.
    fn set_filter(&mut self, filter: FilterChain);
}
