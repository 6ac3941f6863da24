use super::TextFilter;
use serde::Deserialize;

/// Replaces each configured separator character with a space.
#[derive(Debug, Clone)]
pub struct SeparatorTextFilter {
    separators: Vec<char>,
}

/// JSON options: `{ "Separators": "/,;" }`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SeparatorOptions {
    #[serde(default)]
    pub separators: String,
}

impl Default for SeparatorTextFilter {
    fn default() -> Self {
        Self {
            separators: vec!['/', ','],
        }
    }
}

impl SeparatorTextFilter {
    pub fn new(separators: impl IntoIterator<Item = char>) -> Self {
        let mut separators: Vec<char> = separators.into_iter().collect();
        separators.sort_unstable();
        separators.dedup();
        Self { separators }
    }

    pub fn from_options(options: SeparatorOptions) -> Self {
        Self::new(options.separators.chars())
    }
}

impl TextFilter for SeparatorTextFilter {
    fn apply(&self, text: &mut String) {
        if !text.contains(self.separators.as_slice()) {
            return;
        }
        *text = text
            .chars()
            .map(|c| if self.separators.contains(&c) { ' ' } else { c })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(filter: &SeparatorTextFilter, input: &str) -> String {
        let mut text = input.to_string();
        filter.apply(&mut text);
        text
    }

    #[test]
    fn test_default_separators() {
        let filter = SeparatorTextFilter::default();
        assert_eq!(apply(&filter, ""), "");
        assert_eq!(apply(&filter, "Hello world"), "Hello world");
        assert_eq!(apply(&filter, "one/uno"), "one uno");
        assert_eq!(apply(&filter, "one,uno,heis"), "one uno heis");
    }

    #[test]
    fn test_configured_separators_replace_defaults() {
        let filter = SeparatorTextFilter::from_options(SeparatorOptions {
            separators: ";-".to_string(),
        });
        assert_eq!(apply(&filter, "a;b-c/d"), "a b c/d");
    }
}
