use super::TextFilter;

const LEFT_SINGLE_QUOTE: char = '\u{2018}';
const RIGHT_SINGLE_QUOTE: char = '\u{2019}';

/// Converts `‘` and `’` into `'` when both neighbours are letters.
///
/// Quotes used as quotation marks (`‘hey!’`) are kept as they are.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmartQuoteTextFilter;

impl TextFilter for SmartQuoteTextFilter {
    fn apply(&self, text: &mut String) {
        if !text.contains([LEFT_SINGLE_QUOTE, RIGHT_SINGLE_QUOTE]) {
            return;
        }

        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        for (i, &c) in chars.iter().enumerate() {
            let is_elision = (c == LEFT_SINGLE_QUOTE || c == RIGHT_SINGLE_QUOTE)
                && i > 0
                && i + 1 < chars.len()
                && chars[i - 1].is_alphabetic()
                && chars[i + 1].is_alphabetic();
            out.push(if is_elision { '\'' } else { c });
        }
        *text = out;
    }
}
