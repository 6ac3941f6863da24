use std::fmt;

/// Expands one token into a small set of related tokens.
///
/// The returned set contains the input itself unless the multiplier is meant
/// to drop it; additional forms follow the original.
pub trait TokenMultiplier: Send + fmt::Debug {
    fn multiply(&self, token: &str) -> Vec<String>;
}

/// Adds the reversed token, enabling suffix lookups on the token table.
///
/// Palindromes produce a single token.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReverseTokenMultiplier;

impl TokenMultiplier for ReverseTokenMultiplier {
    fn multiply(&self, token: &str) -> Vec<String> {
        let reversed: String = token.chars().rev().collect();
        if reversed == token {
            vec![token.to_string()]
        } else {
            vec![token.to_string(), reversed]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_keeps_original_first() {
        assert_eq!(ReverseTokenMultiplier.multiply("abc"), vec!["abc", "cba"]);
        assert_eq!(ReverseTokenMultiplier.multiply("über"), vec!["über", "rebü"]);
    }

    #[test]
    fn test_palindrome_single() {
        assert_eq!(ReverseTokenMultiplier.multiply("anna"), vec!["anna"]);
        assert_eq!(ReverseTokenMultiplier.multiply(""), vec![""]);
    }
}
