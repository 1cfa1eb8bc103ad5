//! MIME wildcard matching: `*` matches any run of characters, `?` matches exactly one.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wildcard {
    pattern: Vec<char>,
}

impl Wildcard {
    pub fn parse(text: &str) -> Wildcard {
        Wildcard { pattern: text.chars().collect() }
    }

    /// Anchored glob match of `candidate` against this wildcard.
    pub fn is_match(&self, candidate: &str) -> bool {
        let candidate: Vec<char> = candidate.chars().collect();
        matches(&self.pattern, &candidate)
    }
}

fn matches(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            matches(&pattern[1..], text)
                || (!text.is_empty() && matches(pattern, &text[1..]))
        }
        Some('?') => !text.is_empty() && matches(&pattern[1..], &text[1..]),
        Some(c) => text.first() == Some(c) && matches(&pattern[1..], &text[1..]),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn exact_containment_with_no_wildcards() {
        assert!(Wildcard::parse("application/pdf").is_match("application/pdf"));
        assert!(!Wildcard::parse("application/pdf").is_match("application/zip"));
    }

    #[test]
    fn star_matches_any_run() {
        assert!(Wildcard::parse("*pdf").is_match("application/pdf"));
        assert!(Wildcard::parse("application/*").is_match("application/pdf"));
        assert!(Wildcard::parse("*").is_match("anything"));
    }

    #[test]
    fn question_mark_matches_exactly_one_char() {
        assert!(Wildcard::parse("application/pd?").is_match("application/pdf"));
        assert!(!Wildcard::parse("application/pd?").is_match("application/pd"));
    }
}
