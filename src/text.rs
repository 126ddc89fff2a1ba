//! Text cleaning, splitting and stemming
//!
//! Turns raw lines of text into the stemmed words stored in the index and
//! used to build canonical queries. Every function here is pure; a
//! [`Stemmer`] holds no mutable state and can be shared between threads.

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Anything that is not a letter or whitespace is dropped by [`clean`]
///
/// Combining accents left over from decomposition are not alphabetic, so
/// they are dropped as well.
static NON_ALPHABETIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{Alphabetic}\s]+").expect("valid regex"));

/// Create the stemmer used for both indexing and querying
pub fn english_stemmer() -> Stemmer {
    Stemmer::create(Algorithm::English)
}

/// Lowercase and normalize the text, then strip every non-alphabetic character
///
/// The text is decomposed (NFD) before stripping, which folds accented
/// letters onto their base letter (`café` becomes `cafe`). What survives is
/// recomposed (NFC). Whitespace is kept so the result can still be split
/// into words.
pub fn clean(text: &str) -> String {
    let decomposed: String = text.to_lowercase().nfd().collect();
    NON_ALPHABETIC.replace_all(&decomposed, "").nfc().collect()
}

/// Split already-cleaned text on whitespace, skipping empty pieces
pub fn split(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Clean, split and stem a line, preserving word order and duplicates
pub fn stem_line(line: &str, stemmer: &Stemmer) -> Vec<String> {
    let cleaned = clean(line);
    split(&cleaned)
        .into_iter()
        .map(|word| stemmer.stem(word).into_owned())
        .collect()
}

/// Clean, split and stem a line into a sorted, deduplicated set of words
pub fn unique_stems(line: &str, stemmer: &Stemmer) -> BTreeSet<String> {
    stem_line(line, stemmer).into_iter().collect()
}

/// Join a set of stems into its canonical query string
///
/// The set is already ordered, so the result is the lexicographically
/// sorted, space-joined term list. An empty set gives an empty string.
pub fn canonical_query(stems: &BTreeSet<String>) -> String {
    stems.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_punctuation_and_digits() {
        assert_eq!(clean("Hello, World! 42 times"), "hello world  times");
        assert_eq!(clean("don't-stop"), "dontstop");
    }

    #[test]
    fn test_clean_folds_accents() {
        assert_eq!(clean("Café naïve"), "cafe naive");
        assert_eq!(clean("ÉLAN\u{0301}"), "elan");
    }

    #[test]
    fn test_accented_and_plain_words_share_stems() {
        let stemmer = english_stemmer();
        assert_eq!(unique_stems("café", &stemmer), unique_stems("cafe", &stemmer));
        assert_eq!(
            unique_stems("Naïve résumé", &stemmer),
            unique_stems("naive resume", &stemmer)
        );
    }

    #[test]
    fn test_split_ignores_extra_whitespace() {
        assert_eq!(split("  the \t cat\nsat  "), vec!["the", "cat", "sat"]);
        assert!(split("   ").is_empty());
    }

    #[test]
    fn test_stem_line_keeps_order_and_duplicates() {
        let stemmer = english_stemmer();
        let stems = stem_line("Cats chased the cats", &stemmer);
        assert_eq!(stems, vec!["cat", "chase", "the", "cat"]);
    }

    #[test]
    fn test_canonical_query_sorted_and_deduplicated() {
        let stemmer = english_stemmer();
        let first = unique_stems("fox dog", &stemmer);
        let second = unique_stems("  Dog   FOX dog ", &stemmer);

        assert_eq!(canonical_query(&first), "dog fox");
        assert_eq!(canonical_query(&first), canonical_query(&second));
    }

    #[test]
    fn test_canonical_query_empty_line() {
        let stemmer = english_stemmer();
        assert_eq!(canonical_query(&unique_stems("123 !!! ...", &stemmer)), "");
    }
}
