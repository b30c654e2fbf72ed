//! Document and chunk types

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// File types the app accepts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// PNG image
    Png,
    /// JPEG image
    Jpeg,
    /// Anything else
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a filename
    pub fn from_filename(filename: &str) -> Self {
        match filename.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => Self::Unknown,
        }
    }

    /// Whether this is one of the accepted image formats
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Png | Self::Jpeg)
    }

    /// MIME type
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Unknown => "application/octet-stream",
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Png => "PNG image",
            Self::Jpeg => "JPEG image",
            Self::Unknown => "Unknown",
        }
    }
}

/// A file uploaded by the user for Submit & Process
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Unique document ID
    pub id: Uuid,
    /// Filename as uploaded
    pub filename: String,
    /// Raw bytes
    pub data: Bytes,
}

impl SourceDocument {
    /// Wrap uploaded bytes
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            data: data.into(),
        }
    }

    /// Read a document from disk
    pub async fn from_path(path: &std::path::Path) -> crate::Result<Self> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| crate::Error::file_read(&filename, e.to_string()))?;
        Ok(Self::new(filename, data))
    }

    /// File type from the filename
    pub fn file_type(&self) -> FileType {
        FileType::from_filename(&self.filename)
    }

    /// SHA-256 of the content, hex encoded
    pub fn content_hash(&self) -> String {
        hash_content(&self.data)
    }
}

/// Hash bytes with SHA-256
pub fn hash_content(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// A bounded slice of the extracted text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Position in the chunk sequence
    pub index: u32,
    /// Chunk text
    pub text: String,
    /// First character (inclusive) in the source text
    pub char_start: usize,
    /// Last character (exclusive) in the source text
    pub char_end: usize,
}

impl TextChunk {
    /// Number of characters in the chunk
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }

    /// Whether the chunk has nothing worth embedding
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
