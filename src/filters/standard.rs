use super::TextFilter;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Folds case and diacritics, keeping only letters, ASCII digits, `'` and
/// space.
///
/// Letters are decomposed (NFD) and their combining marks dropped before
/// lowercasing, so `héllò` becomes `hello`. The typographic apostrophe `’` is
/// folded into `'`. Every other character is removed, including numeric
/// symbols such as `²`, `½` or `Ⅻ`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardTextFilter;

impl TextFilter for StandardTextFilter {
    fn apply(&self, text: &mut String) {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                ' ' | '\'' => out.push(c),
                '\u{2019}' => out.push('\''),
                c if c.is_alphabetic() && !c.is_numeric() => push_folded(&mut out, c),
                c if c.is_ascii_digit() => out.push(c),
                _ => {}
            }
        }
        *text = out;
    }
}

fn push_folded(out: &mut String, c: char) {
    if c.is_ascii() {
        out.push(c.to_ascii_lowercase());
        return;
    }
    for base in std::iter::once(c).nfd().filter(|d| !is_combining_mark(*d)) {
        out.extend(base.to_lowercase());
    }
}
