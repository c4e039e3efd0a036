use std::collections::BTreeSet;

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c.is_ascii_digit() || matches!(c, '!' | ',' | '.' | '?' | '"' | ':' | ';')
}

/// Split free text into a lowercase word set, dropping punctuation and digits.
pub fn tag_words(text: &str) -> BTreeSet<String> {
    text.split(is_separator)
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// True when the two texts share at least one tag word.
pub fn tags_intersect(a: &str, b: &str) -> bool {
    let left = tag_words(a);
    tag_words(b).iter().any(|w| left.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_words_strips_punctuation_and_digits() {
        let words = tag_words("Rust, WebAssembly; web3! \"Backend\"");
        let expected: BTreeSet<String> = ["rust", "webassembly", "web", "backend"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(words, expected);
    }

    #[test]
    fn test_tags_intersect_case_insensitive() {
        assert!(tags_intersect("python, django", "DJANGO"));
        assert!(!tags_intersect("python", "rust go"));
        assert!(!tags_intersect("", "rust"));
    }
}
