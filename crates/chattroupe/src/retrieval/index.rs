//! Flat embedding index persisted as a single JSON file
//!
//! Search is an exact scan over every stored vector. The whole index is
//! rewritten on every build: the new file is written next to the old one and
//! renamed over it, so readers see either the previous or the new index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::TextChunk;

/// Name of the index file inside the index directory
pub const INDEX_FILE: &str = "index.json";

const FORMAT_VERSION: u32 = 1;

/// Similarity measure used to rank chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// L2 distance, smaller is closer
    #[default]
    Euclidean,
    /// Cosine similarity
    Cosine,
    /// Raw inner product
    DotProduct,
}

impl DistanceMetric {
    /// Similarity score where larger always means closer
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Euclidean => -euclidean_distance(a, b),
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::DotProduct => dot(a, b),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (norm_a * norm_b)
}

/// A document that contributed to the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedSource {
    pub filename: String,
    /// SHA-256 of the file bytes
    pub content_hash: String,
}

/// Metadata describing how the index was built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub version: u32,
    pub embedding_model: String,
    /// Vector length; 0 for an empty index
    pub dimensions: usize,
    pub sources: Vec<IndexedSource>,
    pub built_at: DateTime<Utc>,
}

impl IndexManifest {
    pub fn new(embedding_model: impl Into<String>, sources: Vec<IndexedSource>) -> Self {
        Self {
            version: FORMAT_VERSION,
            embedding_model: embedding_model.into(),
            dimensions: 0,
            sources,
            built_at: Utc::now(),
        }
    }
}

/// One stored chunk and its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: TextChunk,
    pub vector: Vec<f32>,
}

/// A chunk returned by a search
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    /// Larger is more similar
    pub score: f32,
}

/// Exact nearest-neighbour index over chunk embeddings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingIndex {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl EmbeddingIndex {
    /// Build an index, checking that every vector has the same length
    pub fn build(mut manifest: IndexManifest, entries: Vec<IndexEntry>) -> Result<Self> {
        let dimensions = entries.first().map(|e| e.vector.len()).unwrap_or(0);

        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dimensions) {
            return Err(Error::index(format!(
                "chunk {} has {} dimensions, expected {}",
                bad.chunk.index,
                bad.vector.len(),
                dimensions
            )));
        }

        manifest.dimensions = dimensions;
        Ok(Self { manifest, entries })
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.manifest.dimensions
    }

    /// Top `k` chunks by similarity to `query`, best first
    ///
    /// Ties keep index order.
    pub fn search(&self, query: &[f32], k: usize, metric: DistanceMetric) -> Result<Vec<ScoredChunk>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimensions() {
            return Err(Error::index(format!(
                "query has {} dimensions but the index has {}; rebuild the index with the current embedding model",
                query.len(),
                self.dimensions()
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, metric.score(query, &entry.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Location of the index file inside `dir`
    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }

    /// Write the index into `dir`, replacing any previous one atomically
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = Self::file_path(dir);

        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(
            "Saved index with {} entries to {}",
            self.entries.len(),
            path.display()
        );
        Ok(path)
    }

    /// Load the index stored in `dir`
    ///
    /// A missing file is `Error::NoIndex`; an unreadable one is `Error::Index`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::file_path(dir);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NoIndex {
                    path: dir.to_path_buf(),
                })
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let index: EmbeddingIndex = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::index(format!("{} is not a valid index: {}", path.display(), e)))?;

        let dimensions = index.manifest.dimensions;
        if index.entries.iter().any(|e| e.vector.len() != dimensions) {
            return Err(Error::index(format!(
                "{} has vectors that do not match its {} dimensions",
                path.display(),
                dimensions
            )));
        }

        Ok(index)
    }
}
