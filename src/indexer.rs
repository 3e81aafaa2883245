//! Corpus indexing pass.
//!
//! Reads JSONL chunk records, builds a fresh sparse index, and persists it.
//! The previously saved vocabulary is reused so term IDs stay stable across
//! passes; document frequencies and every vector are rebuilt from scratch.

use crate::artifacts::{ArtifactManifest, ArtifactStore};
use crate::error::{Error, Result};
use crate::sparse::{DocumentFrequencies, SparseIndex, SparseIndexBuilder, Vocabulary};
use crate::types::{Chunk, ChunkId, Metadata};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Corpus line as written by the chunking pipeline.
#[derive(Debug, Deserialize)]
struct ChunkRecord {
    id: String,
    chunk_text: String,
    #[serde(default)]
    metadata: serde_json::Map<String, Value>,
}

impl ChunkRecord {
    fn into_chunk(self) -> Chunk {
        let mut metadata = Metadata::new();
        for (key, value) in self.metadata {
            match value {
                Value::String(s) => {
                    metadata.insert(key, s);
                }
                Value::Number(n) => {
                    metadata.insert(key, n.to_string());
                }
                Value::Bool(b) => {
                    metadata.insert(key, b.to_string());
                }
                Value::Null => {}
                Value::Array(_) | Value::Object(_) => {
                    tracing::warn!("Dropping non-scalar metadata {:?} on chunk {}", key, self.id);
                }
            }
        }
        Chunk {
            id: ChunkId(self.id),
            text: self.chunk_text,
            metadata,
        }
    }
}

/// JSONL files under `path`: the file itself, or every `*.jsonl` below a
/// directory in path order.
pub fn corpus_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(Error::Corpus {
            path: path.to_path_buf(),
            reason: "no such file or directory".into(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Corpus {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "jsonl")
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Parse one JSONL corpus file. Blank lines are skipped.
pub fn load_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let contents = fs::read_to_string(path)?;
    let mut chunks = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: ChunkRecord = serde_json::from_str(line).map_err(|e| Error::Corpus {
            path: path.to_path_buf(),
            reason: format!("line {}: {e}", line_no + 1),
        })?;
        chunks.push(record.into_chunk());
    }
    Ok(chunks)
}

/// Load every chunk under `path`.
pub fn load_corpus(path: &Path) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for file in corpus_files(path)? {
        let loaded = load_chunks(&file)?;
        tracing::debug!("Read {} chunks from {}", loaded.len(), file.display());
        chunks.extend(loaded);
    }
    Ok(chunks)
}

/// What one indexing pass produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub manifest: ArtifactManifest,
    /// Chunks skipped because their ID was already indexed in this pass.
    pub duplicates: usize,
}

/// Builds and persists the sparse index for a corpus.
pub struct Indexer {
    store: ArtifactStore,
}

impl Indexer {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Index `chunks` and persist the result.
    pub fn index_chunks(&self, chunks: Vec<Chunk>) -> Result<(SparseIndex, IndexSummary)> {
        let vocab = match self.store.load_vocabulary()? {
            Some(vocab) => {
                tracing::info!("Reusing vocabulary of {} terms", vocab.len());
                vocab
            }
            None => Vocabulary::new(),
        };
        let builder =
            SparseIndexBuilder::new(Arc::new(vocab), Arc::new(DocumentFrequencies::new()));

        let mut duplicates = 0;
        for chunk in chunks {
            match builder.add_chunk(chunk) {
                Ok(_) => {}
                Err(Error::DuplicateChunk(id)) => {
                    tracing::warn!("Skipping duplicate chunk {}", id);
                    duplicates += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let index = builder.finish();
        let manifest = self.store.save(&index)?;
        Ok((
            index,
            IndexSummary {
                manifest,
                duplicates,
            },
        ))
    }

    /// Index the JSONL corpus at `corpus` (file or directory).
    pub fn index_path(&self, corpus: &Path) -> Result<(SparseIndex, IndexSummary)> {
        tracing::info!("Starting index of {}", corpus.display());
        let chunks = load_corpus(corpus)?;
        tracing::info!("Loaded {} chunks", chunks.len());

        let (index, summary) = self.index_chunks(chunks)?;
        tracing::info!(
            "Index complete: {} chunks, {} terms, {} duplicates skipped",
            summary.manifest.chunk_count,
            summary.manifest.vocab_size,
            summary.duplicates
        );
        Ok((index, summary))
    }
}
