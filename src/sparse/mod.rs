//! Sparse keyword retrieval: tokenizer, vocabulary, document frequencies,
//! and the TF-IDF index built on top of them.

mod df;
mod index;
mod tokenizer;
mod vocab;

pub use df::DocumentFrequencies;
pub use index::{SparseDoc, SparseIndex, SparseIndexBuilder, SparseVector, tfidf_weight};
pub use tokenizer::{MIN_TERM_LEN, is_stopword, lexical_overlap, term_set, tokenize};
pub use vocab::{TermId, Vocabulary};
