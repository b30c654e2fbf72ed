//! Configuration for ChatTroupe

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::retrieval::DistanceMetric;

/// Environment variable holding the Gemini API key
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Gemini API configuration
    pub gemini: GeminiConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding index configuration
    pub index: IndexConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Answer generation configuration
    pub generation: GenerationConfig,
    /// General chat configuration
    pub chat: ChatConfig,
    /// Server configuration
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then apply the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Read values that come from the environment
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.gemini.api_key = Some(key.trim().to_string());
            }
        }
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(Error::Config(format!(
                "generation.temperature must be within [0, 2], got {}",
                self.generation.temperature
            )));
        }
        if self.gemini.embed_batch_size == 0 {
            return Err(Error::Config("gemini.embed_batch_size must be positive".into()));
        }
        Ok(())
    }
}

/// Gemini (Generative Language API) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key; only ever read from the environment
    #[serde(skip)]
    pub api_key: Option<String>,
    /// API base URL
    pub base_url: String,
    /// Embedding model
    pub embedding_model: String,
    /// Model answering questions about documents
    pub qa_model: String,
    /// Model used for the general chat
    pub chat_model: String,
    /// Multimodal model used for image questions
    pub vision_model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transient failures of non-streaming calls
    pub max_retries: u32,
    /// Texts per batchEmbedContents request (API limit is 100)
    pub embed_batch_size: usize,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            qa_model: "gemini-1.5-flash".to_string(),
            chat_model: "gemini-1.5-flash".to_string(),
            vision_model: "gemini-1.5-pro".to_string(),
            timeout_secs: 120,
            max_retries: 2,
            embed_batch_size: 100,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            chunk_overlap: 1_000,
        }
    }
}

/// Embedding index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the persisted index
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("vector_index"),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the answer synthesizer
    pub top_k: usize,
    /// Similarity metric
    pub metric: DistanceMetric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            metric: DistanceMetric::Euclidean,
        }
    }
}

/// Answer generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Sampling temperature for document answers
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { temperature: 0.7 }
    }
}

/// General chat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Send earlier turns of the conversation along with each message
    pub include_history: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            include_history: true,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
    /// Give every session its own index directory under `index.path`
    pub isolate_session_indexes: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024,
            isolate_session_indexes: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_behaviour() {
        let config = AppConfig::default();
        assert_eq!(config.chunking.chunk_size, 10_000);
        assert_eq!(config.chunking.chunk_overlap, 1_000);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.retrieval.metric, DistanceMetric::Euclidean);
        assert!((config.generation.temperature - 0.7).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [retrieval]
            top_k = 8
            metric = "cosine"

            [index]
            path = "/tmp/my-index"
            "#,
        )
        .unwrap();

        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.retrieval.metric, DistanceMetric::Cosine);
        assert_eq!(config.index.path, PathBuf::from("/tmp/my-index"));
        assert_eq!(config.chunking.chunk_size, 10_000);
        assert_eq!(config.gemini.qa_model, "gemini-1.5-flash");
    }

    #[test]
    fn test_api_key_is_never_read_from_file() {
        let config = AppConfig::from_toml(
            r#"
            [gemini]
            api_key = "from-file"
            "#,
        )
        .unwrap();
        assert!(config.gemini.api_key.is_none());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = AppConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.generation.temperature = 3.5;
        assert!(config.validate().is_err());
    }
}
