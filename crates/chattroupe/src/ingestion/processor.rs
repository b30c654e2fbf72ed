//! Submit & Process: extract, chunk, embed and rebuild the index

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::chunker::TextChunker;
use super::parser::{ExtractedText, TextExtractor};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::retrieval::{EmbeddingIndex, IndexEntry, IndexManifest, IndexedSource};
use crate::types::{IngestSummary, SourceDocument, TextChunk};

/// Builds the embedding index from a set of documents
///
/// Every call is a full rebuild. Nothing is written until every chunk has
/// been embedded, so a failed submission leaves the previous index in place.
pub struct EmbeddingIndexer {
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: TextChunker,
    batch_size: usize,
}

impl EmbeddingIndexer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, config: &AppConfig) -> Self {
        Self {
            embedder,
            chunker: TextChunker::from_config(&config.chunking),
            batch_size: config.gemini.embed_batch_size.max(1),
        }
    }

    /// Index `documents` into `index_dir`, replacing whatever was there
    pub async fn index_documents(
        &self,
        documents: &[SourceDocument],
        index_dir: &Path,
    ) -> Result<IngestSummary> {
        if documents.is_empty() {
            return Err(Error::NoDocuments);
        }

        let start = Instant::now();
        tracing::info!("Processing {} document(s)", documents.len());

        let owned = documents.to_vec();
        let extracted: ExtractedText =
            tokio::task::spawn_blocking(move || TextExtractor::extract_all(&owned))
                .await
                .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        let chunks: Vec<TextChunk> = self
            .chunker
            .split(&extracted.text)
            .into_iter()
            .filter(|c| !c.is_blank())
            .collect();

        tracing::info!(
            "Extracted {} characters from {} page(s), {} chunk(s) to embed",
            extracted.char_count(),
            extracted.pages_with_text(),
            chunks.len()
        );

        let vectors = self.embed_chunks(&chunks).await?;

        let sources = extracted
            .documents
            .iter()
            .map(|d| IndexedSource {
                filename: d.filename.clone(),
                content_hash: d.content_hash.clone(),
            })
            .collect();
        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();
        let chunk_count = entries.len();

        let index = EmbeddingIndex::build(IndexManifest::new(self.embedder.model(), sources), entries)?;
        let dir = index_dir.to_path_buf();
        let index_path = tokio::task::spawn_blocking(move || index.save(&dir))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        let summary = IngestSummary {
            documents: extracted.documents.iter().map(|d| d.filename.clone()).collect(),
            pages_with_text: extracted.pages_with_text(),
            characters: extracted.char_count(),
            chunks: chunk_count,
            index_path,
            processing_time_ms: start.elapsed().as_millis() as u64,
        };

        if summary.chunks == 0 {
            tracing::warn!("No extractable text; wrote an empty index");
        }
        tracing::info!(
            "Indexed {} chunk(s) in {}ms",
            summary.chunks,
            summary.processing_time_ms
        );

        Ok(summary)
    }

    async fn embed_chunks(&self, chunks: &[TextChunk]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(chunks.len());

        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self.embedder.embed_documents(&texts).await?;

            if embedded.len() != texts.len() {
                return Err(Error::embedding(format!(
                    "{} returned {} vectors for {} chunks",
                    self.embedder.name(),
                    embedded.len(),
                    texts.len()
                )));
            }

            tracing::debug!("Embedded batch {} ({} chunks)", batch_no + 1, texts.len());
            vectors.extend(embedded);
        }

        Ok(vectors)
    }
}
