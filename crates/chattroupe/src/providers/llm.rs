//! LLM provider trait for text and multimodal generation

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use serde::Serialize;
use std::pin::Pin;

use crate::error::Result;

/// Incremental text fragments of one generated reply
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// A piece of a turn
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// Raw media bytes with their MIME type
    InlineData { mime_type: String, data: Bytes },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            Part::InlineData { .. } => None,
        }
    }
}

/// One turn of the conversation sent to the model
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![Part::text(text)])
    }

    /// All text parts joined
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }
}

/// A generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Model to call
    pub model: String,
    /// Conversation, oldest first; the last turn is the user's
    pub contents: Vec<Turn>,
    /// Sampling temperature; `None` keeps the model default
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, contents: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            contents,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Text of the final user turn
    pub fn last_user_text(&self) -> String {
        self.contents
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(Turn::text)
            .unwrap_or_default()
    }
}

/// Trait for generation backends
///
/// Implementations:
/// - `GeminiClient`: Gemini generateContent / streamGenerateContent
/// - `MockLlm`: scripted replies for tests
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a complete reply
    async fn generate(&self, request: GenerationRequest) -> Result<String>;

    /// Generate a reply as a stream of fragments
    ///
    /// Dropping the stream cancels the request.
    async fn generate_stream(&self, request: GenerationRequest) -> Result<FragmentStream>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
