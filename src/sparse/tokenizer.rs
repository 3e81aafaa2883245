//! Term tokenizer shared by indexing, querying, and lexical overlap.
//!
//! Indexing and querying must see identical terms, so everything that turns
//! text into terms goes through [`tokenize`].

use std::collections::BTreeSet;

/// Fixed English stopword list. Must stay sorted for binary search.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "could", "for", "from",
    "had", "has", "have", "he", "i", "if", "in", "is", "it", "its", "may", "might", "must", "not",
    "of", "on", "or", "should", "that", "the", "their", "they", "this", "to", "was", "we", "will",
    "with", "would", "you",
];

/// Minimum term length in characters.
pub const MIN_TERM_LEN: usize = 2;

pub fn is_stopword(term: &str) -> bool {
    STOPWORDS.binary_search(&term).is_ok()
}

/// Split text into normalized terms.
///
/// Lowercases, splits on anything that is not ASCII alphanumeric, and drops
/// short tokens and stopwords. The returned iterator is lazy and `Clone`, so
/// it can be restarted without re-reading the source.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + Clone + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| s.len() >= MIN_TERM_LEN)
        .map(|s| s.to_ascii_lowercase())
        .filter(|s| !is_stopword(s))
}

/// Distinct terms of `text`, in sorted order.
pub fn term_set(text: &str) -> BTreeSet<String> {
    tokenize(text).collect()
}

/// Jaccard similarity of the term sets of `query` and `text`.
///
/// Returns 0.0 when both sides are empty.
pub fn lexical_overlap(query: &str, text: &str) -> f32 {
    let q = term_set(query);
    let t = term_set(text);
    let union = q.union(&t).count();
    if union == 0 {
        return 0.0;
    }
    q.intersection(&t).count() as f32 / union as f32
}
