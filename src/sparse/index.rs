//! TF-IDF sparse index.
//!
//! Build path: [`SparseIndexBuilder::add_chunk`] tokenizes a chunk, assigns
//! term IDs, records the chunk in the document frequency table, then weights
//! every term with
//!
//! ```text
//! weight = (1 + ln(tf)) * ln((N + 1) / (df + 1)) + 1
//! ```
//!
//! `N` and `df` are read after the chunk's own frequency update, so the very
//! first chunk sees `N = 1, df = 1` and all of its weights are exactly 1.0.
//! Stored vectors are never rewritten; adding chunks later does not reweight
//! earlier ones.
//!
//! Query path: [`SparseIndex::search`] weights known query terms with the
//! same formula against the frozen table and accumulates dot products through
//! the inverted index.

use super::df::DocumentFrequencies;
use super::tokenizer::tokenize;
use super::vocab::{TermId, Vocabulary};
use crate::error::{Error, Result};
use crate::retriever::Retriever;
use crate::types::{Chunk, ChunkId, Hit, Side};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// TF-IDF weight of a term.
pub fn tfidf_weight(tf: u32, df: u32, n: u64) -> f32 {
    let tf_component = 1.0 + f64::from(tf.max(1)).ln();
    let idf_component = ((n as f64 + 1.0) / (f64::from(df) + 1.0)).ln();
    (tf_component * idf_component + 1.0) as f32
}

/// Sparse vector as `(term_id, weight)` pairs sorted by term ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub entries: Vec<(TermId, f32)>,
}

impl SparseVector {
    pub fn weight(&self, id: TermId) -> Option<f32> {
        self.entries
            .binary_search_by_key(&id, |&(t, _)| t)
            .ok()
            .map(|i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A stored chunk with its frozen sparse vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseDoc {
    pub chunk: Chunk,
    pub vector: SparseVector,
}

#[derive(Default)]
struct BuilderState {
    docs: Vec<SparseDoc>,
    ids: HashSet<ChunkId>,
}

/// Incremental index builder.
///
/// Chunk builds are serialized by a single-writer lock so that each chunk
/// reads a consistent `N`. The vocabulary and frequency table are injected
/// so that term IDs survive across indexing passes.
pub struct SparseIndexBuilder {
    vocab: Arc<Vocabulary>,
    df: Arc<DocumentFrequencies>,
    state: Mutex<BuilderState>,
}

impl Default for SparseIndexBuilder {
    fn default() -> Self {
        Self::new(Arc::new(Vocabulary::new()), Arc::new(DocumentFrequencies::new()))
    }
}

impl SparseIndexBuilder {
    pub fn new(vocab: Arc<Vocabulary>, df: Arc<DocumentFrequencies>) -> Self {
        Self {
            vocab,
            df,
            state: Mutex::new(BuilderState::default()),
        }
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn frequencies(&self) -> &Arc<DocumentFrequencies> {
        &self.df
    }

    /// Index one chunk and return its stored vector.
    pub fn add_chunk(&self, chunk: Chunk) -> Result<SparseVector> {
        let mut state = self.state.lock();
        if state.ids.contains(&chunk.id) {
            return Err(Error::DuplicateChunk(chunk.id.to_string()));
        }

        let mut tf: BTreeMap<TermId, u32> = BTreeMap::new();
        for term in tokenize(&chunk.text) {
            *tf.entry(self.vocab.get_or_create_id(&term)).or_insert(0) += 1;
        }

        let unique: BTreeSet<TermId> = tf.keys().copied().collect();
        self.df.record_document(&unique);
        let n = self.df.document_count();

        let vector = SparseVector {
            entries: tf
                .into_iter()
                .map(|(id, count)| (id, tfidf_weight(count, self.df.get(id), n)))
                .collect(),
        };

        tracing::debug!(
            chunk = %chunk.id,
            terms = vector.len(),
            documents = n,
            "indexed chunk"
        );

        state.ids.insert(chunk.id.clone());
        state.docs.push(SparseDoc {
            chunk,
            vector: vector.clone(),
        });
        Ok(vector)
    }

    /// Number of chunks indexed so far.
    pub fn len(&self) -> usize {
        self.state.lock().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze into a read-only index.
    pub fn finish(self) -> SparseIndex {
        let state = self.state.into_inner();
        SparseIndex::assemble(self.vocab, self.df, state.docs)
    }
}

#[derive(Debug, Clone, Copy)]
struct Posting {
    doc: u32,
    weight: f32,
}

/// Read-only TF-IDF index answering sparse queries.
pub struct SparseIndex {
    vocab: Arc<Vocabulary>,
    df: Arc<DocumentFrequencies>,
    docs: Vec<SparseDoc>,
    /// Inverted index: term -> postings in document order.
    postings: HashMap<TermId, Vec<Posting>>,
}

impl SparseIndex {
    fn assemble(vocab: Arc<Vocabulary>, df: Arc<DocumentFrequencies>, docs: Vec<SparseDoc>) -> Self {
        let mut postings: HashMap<TermId, Vec<Posting>> = HashMap::new();
        for (doc, sparse) in docs.iter().enumerate() {
            for &(id, weight) in &sparse.vector.entries {
                postings.entry(id).or_default().push(Posting {
                    doc: doc as u32,
                    weight,
                });
            }
        }
        Self {
            vocab,
            df,
            docs,
            postings,
        }
    }

    /// Rebuild from persisted parts, checking that they agree.
    pub fn from_parts(
        vocab: Vocabulary,
        df: DocumentFrequencies,
        docs: Vec<SparseDoc>,
    ) -> std::result::Result<Self, String> {
        if df.document_count() != docs.len() as u64 {
            return Err(format!(
                "document count {} does not match {} stored chunks",
                df.document_count(),
                docs.len()
            ));
        }
        if let Some(id) = df.to_map().keys().find(|&&id| vocab.term(id).is_none()) {
            return Err(format!("frequency table references unknown term id {id}"));
        }

        let mut ids = HashSet::with_capacity(docs.len());
        for doc in &docs {
            if !ids.insert(&doc.chunk.id) {
                return Err(format!("chunk {} is stored twice", doc.chunk.id));
            }
            if let Some(&(id, _)) = doc
                .vector
                .entries
                .iter()
                .find(|&&(id, _)| df.get(id) == 0)
            {
                return Err(format!(
                    "chunk {} references term id {id} with no document frequency",
                    doc.chunk.id
                ));
            }
        }

        Ok(Self::assemble(Arc::new(vocab), Arc::new(df), docs))
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn frequencies(&self) -> &DocumentFrequencies {
        &self.df
    }

    pub fn docs(&self) -> &[SparseDoc] {
        &self.docs
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Weighted query vector; unknown terms are skipped.
    pub fn query_vector(&self, query: &str) -> SparseVector {
        let mut tf: BTreeMap<TermId, u32> = BTreeMap::new();
        for term in tokenize(query) {
            if let Some(id) = self.vocab.lookup_id(&term) {
                *tf.entry(id).or_insert(0) += 1;
            }
        }
        let n = self.df.document_count();
        SparseVector {
            entries: tf
                .into_iter()
                .map(|(id, count)| (id, tfidf_weight(count, self.df.get(id), n)))
                .collect(),
        }
    }

    /// Top-`k` chunks by dot product with the query vector.
    ///
    /// Only chunks sharing at least one term with the query are scored.
    /// Ties are broken by chunk ID ascending.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<Hit> {
        let query_vector = self.query_vector(query);
        let mut scores: HashMap<u32, f32> = HashMap::new();

        for &(id, query_weight) in &query_vector.entries {
            let Some(postings) = self.postings.get(&id) else {
                continue;
            };
            for posting in postings {
                *scores.entry(posting.doc).or_default() += query_weight * posting.weight;
            }
        }

        let mut ranked: Vec<(u32, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1).then_with(|| {
                self.docs[a.0 as usize]
                    .chunk
                    .id
                    .cmp(&self.docs[b.0 as usize].chunk.id)
            })
        });
        ranked.truncate(top_k);

        ranked
            .into_iter()
            .map(|(doc, score)| {
                let chunk = &self.docs[doc as usize].chunk;
                Hit {
                    id: chunk.id.clone(),
                    score,
                    text: chunk.text.clone(),
                    metadata: chunk.metadata.clone(),
                }
            })
            .collect()
    }
}

#[async_trait]
impl Retriever for SparseIndex {
    fn name(&self) -> &str {
        "tfidf"
    }

    fn side(&self) -> Side {
        Side::Sparse
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Hit>> {
        Ok(SparseIndex::search(self, query, top_k))
    }
}
