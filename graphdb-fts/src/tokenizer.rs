//! Splits document and query text into lowercase, alphanumeric terms.
//! Deliberately simple: no stemming, no stopword list — the core only
//! promises the tokenization rule the index is built and queried with.

/// Lowercases `text` and splits on runs of non-alphanumeric characters,
/// dropping empty runs.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_punctuation_and_whitespace() {
        assert_eq!(
            tokenize("New York City is amazing!"),
            vec!["new", "york", "city", "is", "amazing"]
        );
    }

    #[test]
    fn lowercases_terms() {
        assert_eq!(tokenize("Software Engineer"), vec!["software", "engineer"]);
    }

    #[test]
    fn drops_empty_runs() {
        assert_eq!(tokenize("a--b..c"), vec!["a", "b", "c"]);
    }
}
