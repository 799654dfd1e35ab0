//! Trigram similarity compatible with Postgres `pg_trgm`.

use std::collections::HashSet;

/// Trigram set of `text`.
///
/// Text is lowercased and split into alphanumeric words; each word is padded
/// with two leading spaces and one trailing space before taking every
/// three-character window.
pub fn trigrams(text: &str) -> HashSet<String> {
    let mut set = HashSet::new();
    let lowered = text.to_lowercase();

    for word in lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let padded: Vec<char> = "  ".chars().chain(word.chars()).chain(" ".chars()).collect();
        for window in padded.windows(3) {
            set.insert(window.iter().collect());
        }
    }

    set
}

/// Shared trigrams over the union of both trigram sets, in `0.0..=1.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let left = trigrams(a);
    let right = trigrams(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let common = left.intersection(&right).count();
    let union = left.len() + right.len() - common;
    common as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_trigrams() {
        let set = trigrams("cat");
        let expected: HashSet<String> = ["  c", " ca", "cat", "at "]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(set, expected);
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("Django Tips", "django tips"), 1.0);
        assert_eq!(similarity("", "django"), 0.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_similarity_matches_pg_trgm() {
        // SELECT similarity('word', 'two words') = 0.363636
        let score = similarity("word", "two words");
        assert!((score - 4.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_query_passes_default_threshold() {
        assert!(similarity("Django Tips", "django") > 0.1);
        assert!(similarity("Python Basics", "django") <= 0.1);
    }
}
