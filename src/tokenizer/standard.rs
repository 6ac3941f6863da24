use super::{Tokenizer, Tokens};
use crate::filters::FilterChain;

/// Splits on spaces and apostrophes.
#[derive(Debug, Default)]
pub struct StandardTokenizer {
    filter: Option<FilterChain>,
}

impl StandardTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: FilterChain) -> Self {
        Self {
            filter: Some(filter),
        }
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize<'a>(&'a self, text: &'a str) -> Tokens<'a> {
        Box::new(
            text.split([' ', '\''])
                .filter(|piece| !piece.is_empty())
                .filter_map(move |piece| {
                    let mut token = piece.to_string();
                    if let Some(filter) = &self.filter {
                        filter.apply(&mut token);
                    }
                    (!token.is_empty()).then_some(token)
                }),
        )
    }

    fn set_filter(&mut self, filter: FilterChain) {
        self.filter = Some(filter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{StandardTextFilter, StopwordTextFilter, WhitespaceTextFilter};

    fn tokens(tokenizer: &StandardTokenizer, text: &str) -> Vec<String> {
        tokenizer.tokenize(text).collect()
    }

    #[test]
    fn test_tokenize_with_filters() {
        let tokenizer = StandardTokenizer::with_filter(
            FilterChain::new()
                .with(WhitespaceTextFilter)
                .with(StandardTextFilter),
        );

        assert!(tokens(&tokenizer, "").is_empty());
        assert!(tokens(&tokenizer, "  ").is_empty());
        assert_eq!(tokens(&tokenizer, "One"), vec!["one"]);
        assert_eq!(tokens(&tokenizer, "One, Two! "), vec!["one", "two"]);
    }

    #[test]
    fn test_splits_on_apostrophe() {
        let tokenizer = StandardTokenizer::new();
        assert_eq!(tokens(&tokenizer, "l'arco d'oro"), vec!["l", "arco", "d", "oro"]);
        assert_eq!(tokens(&tokenizer, "a  b"), vec!["a", "b"]);
    }

    #[test]
    fn test_filter_drops_tokens() {
        let tokenizer =
            StandardTokenizer::with_filter(FilterChain::new().with(StopwordTextFilter::default()));
        assert_eq!(tokens(&tokenizer, "the arc of 1984"), vec!["arc"]);
    }

    #[test]
    fn test_each_call_restarts() {
        let tokenizer = StandardTokenizer::new();
        let first: Vec<_> = tokenizer.tokenize("x y").collect();
        let second: Vec<_> = tokenizer.tokenize("x y").collect();
        assert_eq!(first, second);
    }
}
