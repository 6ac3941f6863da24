use super::TextFilter;
use serde::Deserialize;

const DEFAULT_STOPWORDS: &[&str] = &[
    "the", "an", "a", "of", "in", "and", "was", "to", "is", "on", "at", "by", "or", "as", "that",
    "from", "s", "it", "with", "between", "no", "its", "this", "were", "are",
];

/// Blanks the text when it is a stopword or, optionally, made only of digits.
///
/// Matching is exact and case-sensitive: the whole text must equal one of the
/// configured words. Place it after case folding in a chain.
#[derive(Debug, Clone)]
pub struct StopwordTextFilter {
    /// Sorted by descending length, then alphabetically.
    stopwords: Vec<String>,
    stop_on_digit_only: bool,
}

/// JSON options: `{ "Stopwords": ["the", "a"], "StopOnDigitOnly": true }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StopwordOptions {
    #[serde(default = "default_stopwords")]
    pub stopwords: Vec<String>,
    #[serde(default = "default_true")]
    pub stop_on_digit_only: bool,
}

fn default_true() -> bool {
    true
}

fn default_stopwords() -> Vec<String> {
    DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect()
}

impl Default for StopwordOptions {
    fn default() -> Self {
        Self {
            stopwords: default_stopwords(),
            stop_on_digit_only: true,
        }
    }
}

impl Default for StopwordTextFilter {
    fn default() -> Self {
        Self::new(StopwordOptions::default())
    }
}

impl StopwordTextFilter {
    pub fn new(options: StopwordOptions) -> Self {
        let mut stopwords = options.stopwords;
        stopwords.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        stopwords.dedup();
        Self {
            stopwords,
            stop_on_digit_only: options.stop_on_digit_only,
        }
    }

    pub fn stopwords(&self) -> &[String] {
        &self.stopwords
    }

    fn is_stopword(&self, text: &str) -> bool {
        // Longest first: skip longer words, stop at the first shorter one.
        for word in &self.stopwords {
            if word.len() > text.len() {
                continue;
            }
            if word.len() < text.len() {
                return false;
            }
            if word == text {
                return true;
            }
        }
        false
    }
}

impl TextFilter for StopwordTextFilter {
    fn apply(&self, text: &mut String) {
        if self.stop_on_digit_only && !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
            text.clear();
            return;
        }
        if self.is_stopword(text) {
            text.clear();
        }
    }
}
