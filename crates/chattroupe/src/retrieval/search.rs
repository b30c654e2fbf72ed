//! Question-to-chunks retrieval over the persisted index

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::index::{DistanceMetric, EmbeddingIndex, ScoredChunk};
use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;

/// Loads the index and finds the chunks closest to a question
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    metric: DistanceMetric,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, config: &RetrievalConfig) -> Self {
        Self {
            embedder,
            top_k: config.top_k.max(1),
            metric: config.metric,
        }
    }

    /// Top-K chunks of the index in `index_dir` for `question`
    ///
    /// The index is read from disk on every call, so a rebuild is visible
    /// to the next question.
    pub async fn retrieve(&self, index_dir: &Path, question: &str) -> Result<Vec<ScoredChunk>> {
        let start = Instant::now();
        let index = load_index(index_dir).await?;

        if index.is_empty() {
            return Err(Error::NoIndex {
                path: index_dir.to_path_buf(),
            });
        }

        let query = self.embedder.embed_query(question).await?;
        let results = index.search(&query, self.top_k, self.metric)?;

        tracing::debug!(
            "Retrieved {} of {} chunks ({:?}) in {:?}",
            results.len(),
            index.len(),
            self.metric,
            start.elapsed()
        );

        Ok(results)
    }
}

/// Read the index off the async runtime
pub async fn load_index(index_dir: &Path) -> Result<EmbeddingIndex> {
    let dir = index_dir.to_path_buf();
    tokio::task::spawn_blocking(move || EmbeddingIndex::load(&dir))
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockEmbedder;
    use crate::retrieval::index::{IndexEntry, IndexManifest};
    use crate::types::TextChunk;

    async fn write_index(dir: &Path, embedder: &MockEmbedder, texts: &[&str]) {
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let vectors = embedder.embed_documents(&owned).await.unwrap();
        let entries = owned
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| IndexEntry {
                chunk: TextChunk {
                    index: i as u32,
                    char_start: 0,
                    char_end: text.chars().count(),
                    text,
                },
                vector,
            })
            .collect();
        EmbeddingIndex::build(IndexManifest::new("mock-embedding", Vec::new()), entries)
            .unwrap()
            .save(dir)
            .unwrap();
    }

    #[tokio::test]
    async fn test_returns_most_similar_chunk_first() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(MockEmbedder::default());
        write_index(
            dir.path(),
            &embedder,
            &[
                "The warranty lasts two years",
                "Shipping takes five days",
                "Returns are accepted within thirty days",
            ],
        )
        .await;

        let retriever = Retriever::new(embedder, &RetrievalConfig::default());
        let results = retriever
            .retrieve(dir.path(), "How long does the warranty last?")
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.text, "The warranty lasts two years");
    }

    #[tokio::test]
    async fn test_absent_or_empty_index_is_no_index() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(MockEmbedder::default());
        let retriever = Retriever::new(embedder.clone(), &RetrievalConfig::default());

        let err = retriever.retrieve(dir.path(), "anything").await.unwrap_err();
        assert!(matches!(err, Error::NoIndex { .. }));

        write_index(dir.path(), &embedder, &[]).await;
        let err = retriever.retrieve(dir.path(), "anything").await.unwrap_err();
        assert!(matches!(err, Error::NoIndex { .. }));
        // The question is never embedded when there is nothing to search
        assert_eq!(embedder.calls(), 1);
    }
}
