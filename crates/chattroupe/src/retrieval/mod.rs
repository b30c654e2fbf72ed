//! Embedding index storage and similarity search

pub mod index;
pub mod search;

pub use index::{
    DistanceMetric, EmbeddingIndex, IndexEntry, IndexManifest, IndexedSource, ScoredChunk,
    INDEX_FILE,
};
pub use search::{load_index, Retriever};
