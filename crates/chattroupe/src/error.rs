//! Error types for ChatTroupe

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ChatTroupe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an error, used to pick the message shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or unreadable user input (documents, image, empty question)
    Input,
    /// The session or the index is not in a state that allows the action
    ResourceState,
    /// The Gemini API failed (auth, quota, network, malformed response)
    ExternalService,
    /// Configuration or local I/O problems
    Internal,
}

/// ChatTroupe errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An uploaded file could not be read or decoded
    #[error("Failed to read file '{filename}': {message}")]
    FileRead { filename: String, message: String },

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    /// Required text input was blank
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Submit & Process called without any documents
    #[error("No documents were uploaded")]
    NoDocuments,

    /// Image question asked before an image was uploaded
    #[error("No image has been uploaded")]
    NoImage,

    /// Question asked before any document was indexed
    #[error("No embedding index at {}", path.display())]
    NoIndex { path: PathBuf },

    /// Index file exists but is unusable
    #[error("Index error: {0}")]
    Index(String),

    /// Unknown session id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Generation (LLM) error
    #[error("LLM error: {0}")]
    Llm(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a file read error
    pub fn file_read(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileRead {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an index error
    pub fn index(message: impl Into<String>) -> Self {
        Self::Index(message.into())
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::FileRead { .. }
            | Error::UnsupportedFile(_)
            | Error::EmptyInput(_)
            | Error::NoDocuments
            | Error::NoImage => ErrorKind::Input,
            Error::NoIndex { .. } | Error::Index(_) | Error::SessionNotFound(_) => {
                ErrorKind::ResourceState
            }
            Error::Embedding(_) | Error::Llm(_) | Error::Http(_) => ErrorKind::ExternalService,
            Error::Config(_) | Error::Io(_) | Error::Json(_) | Error::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Message suitable for showing to the person using the app
    pub fn user_message(&self) -> String {
        match self {
            Error::NoIndex { .. } => {
                "No documents have been indexed yet. Upload PDF files and run Submit & Process first."
                    .to_string()
            }
            Error::Index(_) => {
                "The document index could not be loaded. Please submit your documents again."
                    .to_string()
            }
            Error::FileRead { filename, .. } => format!(
                "Could not read this file: {}. Make sure it is a valid, unencrypted file.",
                filename
            ),
            Error::UnsupportedFile(name) => format!("Could not read this file: {}.", name),
            Error::EmptyInput(what) => format!("Please enter {} first.", what),
            Error::NoDocuments => "Please upload at least one PDF file.".to_string(),
            Error::NoImage => "Please upload an image first.".to_string(),
            Error::SessionNotFound(_) => {
                "Your session has expired. Please start a new one.".to_string()
            }
            Error::Embedding(_) | Error::Llm(_) | Error::Http(_) => {
                "The AI service is unavailable right now. Please try again in a moment.".to_string()
            }
            Error::Config(msg) => format!("The application is misconfigured: {}", msg),
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => {
                "Something went wrong on our side. Please try again.".to_string()
            }
        }
    }

    /// Short machine-readable label
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::FileRead { .. } => "file_read_error",
            Error::UnsupportedFile(_) => "unsupported_type",
            Error::EmptyInput(_) => "empty_input",
            Error::NoDocuments => "no_documents",
            Error::NoImage => "no_image",
            Error::NoIndex { .. } => "no_index",
            Error::Index(_) => "index_error",
            Error::SessionNotFound(_) => "session_not_found",
            Error::Embedding(_) => "embedding_error",
            Error::Llm(_) => "llm_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Http(_) => "http_error",
            Error::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Error::NoIndex { .. } | Error::Index(_) => StatusCode::CONFLICT,
            _ => match self.kind() {
                ErrorKind::Input => StatusCode::BAD_REQUEST,
                ErrorKind::ResourceState => StatusCode::CONFLICT,
                ErrorKind::ExternalService => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{}", self);
        }

        let body = Json(json!({
            "error": {
                "type": self.error_type(),
                "message": self.user_message(),
                "detail": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
