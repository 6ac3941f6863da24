use super::{Tokenizer, Tokens};
use crate::filters::FilterChain;

/// Yields the whole (filtered) text as a single token.
#[derive(Debug, Default)]
pub struct NullTokenizer {
    filter: Option<FilterChain>,
}

impl NullTokenizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tokenizer for NullTokenizer {
    fn tokenize<'a>(&'a self, text: &'a str) -> Tokens<'a> {
        let mut token = text.to_string();
        if let Some(filter) = &self.filter {
            filter.apply(&mut token);
        }
        if token.is_empty() {
            Box::new(std::iter::empty())
        } else {
            Box::new(std::iter::once(token))
        }
    }

    fn set_filter(&mut self, filter: FilterChain) {
        self.filter = Some(filter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::StopwordTextFilter;

    #[test]
    fn test_whole_text_is_one_token() {
        let tokenizer = NullTokenizer::new();
        let tokens: Vec<_> = tokenizer.tokenize("new york").collect();
        assert_eq!(tokens, vec!["new york"]);
    }

    #[test]
    fn test_nothing_when_filtered_empty() {
        let mut tokenizer = NullTokenizer::new();
        tokenizer.set_filter(FilterChain::new().with(StopwordTextFilter::default()));
        assert_eq!(tokenizer.tokenize("the").count(), 0);
        assert_eq!(tokenizer.tokenize("").count(), 0);
    }
}
