//! Response types returned by session handlers

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::chat::ChatMessage;
use super::document::FileType;

/// Outcome of Submit & Process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Filenames that were processed
    pub documents: Vec<String>,
    /// Pages that produced text
    pub pages_with_text: usize,
    /// Characters of extracted text
    pub characters: usize,
    /// Chunks stored in the index
    pub chunks: usize,
    /// Where the index was written
    pub index_path: PathBuf,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Answer to a PDF or image question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    /// Chunks used as context (PDF questions only)
    #[serde(default)]
    pub chunks_used: usize,
    pub processing_time_ms: u64,
}

/// Information about the uploaded image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    pub filename: String,
    pub file_type: FileType,
    pub width: u32,
    pub height: u32,
    pub size_bytes: usize,
}

/// Chat history as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<ChatMessage>,
}
