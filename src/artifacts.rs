//! On-disk index artifacts.
//!
//! An artifact directory holds:
//! - `vocab.json`: `{term: id}`
//! - `df.json`: `{document_count, frequencies: {id: count}}`
//! - `chunks.bin`: bincode-encoded stored chunks with their sparse vectors
//! - `manifest.json`: tool version, chunk count, vocabulary size
//!
//! Every file is replaced atomically. The manifest is written last, so a
//! directory whose manifest disagrees with the other files was interrupted
//! mid-write and is rejected on load.

use crate::error::{Error, Result};
use crate::sparse::{DocumentFrequencies, SparseDoc, SparseIndex, TermId, Vocabulary};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const DEFAULT_ARTIFACT_DIR: &str = ".hret";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const VOCAB_FILE: &str = "vocab.json";
pub const DF_FILE: &str = "df.json";
pub const CHUNKS_FILE: &str = "chunks.bin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub tool_version: String,
    pub chunk_count: usize,
    pub vocab_size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct DfArtifact {
    document_count: u64,
    frequencies: BTreeMap<TermId, u32>,
}

/// Reads and writes index artifacts in one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn vocab_path(&self) -> PathBuf {
        self.dir.join(VOCAB_FILE)
    }

    pub fn df_path(&self) -> PathBuf {
        self.dir.join(DF_FILE)
    }

    pub fn chunks_path(&self) -> PathBuf {
        self.dir.join(CHUNKS_FILE)
    }

    /// Whether an index has been saved here.
    pub fn exists(&self) -> bool {
        self.manifest_path().exists()
    }

    /// Persist `index`, replacing any previous artifacts.
    pub fn save(&self, index: &SparseIndex) -> Result<ArtifactManifest> {
        fs::create_dir_all(&self.dir)?;

        let vocab = index.vocabulary().to_map();
        self.write_atomic(&self.vocab_path(), &serde_json::to_vec_pretty(&vocab)?)?;

        let df = DfArtifact {
            document_count: index.frequencies().document_count(),
            frequencies: index.frequencies().to_map(),
        };
        self.write_atomic(&self.df_path(), &serde_json::to_vec_pretty(&df)?)?;

        self.write_atomic(&self.chunks_path(), &bincode::serialize(index.docs())?)?;

        let manifest = ArtifactManifest {
            tool_version: crate::TOOL_VERSION.to_string(),
            chunk_count: index.len(),
            vocab_size: vocab.len(),
        };
        self.write_atomic(&self.manifest_path(), &serde_json::to_vec_pretty(&manifest)?)?;

        tracing::info!(
            "Saved {} chunks and {} terms to {}",
            manifest.chunk_count,
            manifest.vocab_size,
            self.dir.display()
        );
        Ok(manifest)
    }

    /// Load and cross-check every artifact.
    ///
    /// Any missing, unreadable, or inconsistent file fails the whole load;
    /// nothing is partially restored.
    pub fn load(&self) -> Result<SparseIndex> {
        let manifest: ArtifactManifest = read_json(&self.manifest_path())?;
        let vocab = self.read_vocabulary()?;

        let df_path = self.df_path();
        let df: DfArtifact = read_json(&df_path)?;
        let df = DocumentFrequencies::from_parts(df.document_count, df.frequencies)
            .map_err(|reason| Error::corrupt(&df_path, reason))?;

        let chunks_path = self.chunks_path();
        let bytes = read_bytes(&chunks_path)?;
        let docs: Vec<SparseDoc> = bincode::deserialize(&bytes)
            .map_err(|e| Error::corrupt(&chunks_path, e.to_string()))?;

        if manifest.chunk_count != docs.len() {
            return Err(Error::corrupt(
                self.manifest_path(),
                format!(
                    "manifest lists {} chunks but {} are stored",
                    manifest.chunk_count,
                    docs.len()
                ),
            ));
        }
        if manifest.vocab_size != vocab.len() {
            return Err(Error::corrupt(
                self.manifest_path(),
                format!(
                    "manifest lists {} terms but the vocabulary has {}",
                    manifest.vocab_size,
                    vocab.len()
                ),
            ));
        }
        if manifest.tool_version != crate::TOOL_VERSION {
            tracing::warn!(
                "Artifacts written by version {}, running {}",
                manifest.tool_version,
                crate::TOOL_VERSION
            );
        }

        let index = SparseIndex::from_parts(vocab, df, docs)
            .map_err(|reason| Error::corrupt(&self.dir, reason))?;

        tracing::info!(
            "Loaded {} chunks and {} terms from {}",
            index.len(),
            index.vocabulary().len(),
            self.dir.display()
        );
        Ok(index)
    }

    /// The saved vocabulary, if any, so a reindex keeps existing term IDs.
    pub fn load_vocabulary(&self) -> Result<Option<Vocabulary>> {
        if !self.vocab_path().exists() {
            return Ok(None);
        }
        self.read_vocabulary().map(Some)
    }

    fn read_vocabulary(&self) -> Result<Vocabulary> {
        let path = self.vocab_path();
        let map: BTreeMap<String, TermId> = read_json(&path)?;
        Vocabulary::from_map(map).map_err(|reason| Error::corrupt(&path, reason))
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::corrupt(path, e.to_string()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes).map_err(|e| Error::corrupt(path, e.to_string()))
}
