//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;

use crate::error::Result;

/// Trait for generating text embeddings
///
/// Implementations:
/// - `GeminiClient`: Gemini embedding models (text-embedding-004)
/// - `MockEmbedder`: deterministic bag-of-words vectors for tests
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed chunks that will be stored in the index
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a question used to search the index
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier, recorded in the index manifest
    fn model(&self) -> &str;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
