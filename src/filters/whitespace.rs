use super::TextFilter;

/// Trims both ends and collapses every whitespace run into a single space.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTextFilter;

impl TextFilter for WhitespaceTextFilter {
    fn apply(&self, text: &mut String) {
        let mut out = String::with_capacity(text.len());
        for word in text.split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
        *text = out;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(input: &str) -> String {
        let mut text = input.to_string();
        WhitespaceTextFilter.apply(&mut text);
        text
    }

    #[test]
    fn test_normalizes_whitespace() {
        assert_eq!(apply(""), "");
        assert_eq!(apply("Hello world"), "Hello world");
        assert_eq!(apply("Hello\tworld"), "Hello world");
        assert_eq!(apply("  left trim"), "left trim");
        assert_eq!(apply("right trim  "), "right trim");
        assert_eq!(apply("  both  trim\t"), "both trim");
        assert_eq!(apply(" \t\n "), "");
    }

    #[test]
    fn test_idempotent_and_single_spaced() {
        let samples = ["  a \u{a0} b\r\nc  ", "x", "\u{2003}wide\u{2003}space"];
        for sample in samples {
            let once = apply(sample);
            assert!(!once.starts_with(' ') && !once.ends_with(' '));
            assert!(!once.contains("  "));
            assert_eq!(apply(&once), once);
        }
    }
}
