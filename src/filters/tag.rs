use super::TextFilter;

/// Strips bracketed markup (`<...>`).
///
/// Tags are not validated: anything between `<` and the next `>` goes. An
/// unterminated `<` leaves the remaining text untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct TagTextFilter;

impl TextFilter for TagTextFilter {
    fn apply(&self, text: &mut String) {
        if !text.contains('<') {
            return;
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text.as_str();
        while let Some(open) = rest.find('<') {
            match rest[open..].find('>') {
                Some(close) => {
                    out.push_str(&rest[..open]);
                    rest = &rest[open + close + 1..];
                }
                None => break,
            }
        }
        out.push_str(rest);
        *text = out;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(input: &str) -> String {
        let mut text = input.to_string();
        TagTextFilter.apply(&mut text);
        text
    }

    #[test]
    fn test_strips_tags() {
        assert_eq!(apply(""), "");
        assert_eq!(apply("Héllo"), "Héllo");
        assert_eq!(apply("World<sup>12</sup>"), "World12");
        assert_eq!(apply("<sup>12</sup>World"), "12World");
        assert_eq!(apply("Hello<sup>12</sup>World"), "Hello12World");
    }

    #[test]
    fn test_unterminated_tag_left_alone() {
        assert_eq!(apply("Héllo<NotATag"), "Héllo<NotATag");
        assert_eq!(apply("a<b>c<d"), "ac<d");
    }
}
