//! Core types for ChatTroupe

pub mod chat;
pub mod document;
pub mod query;
pub mod response;

pub use chat::{ChatHistory, ChatMessage, Speaker};
pub use document::{hash_content, FileType, SourceDocument, TextChunk};
pub use query::{ChatRequest, QuestionRequest, SessionInfo};
pub use response::{AnswerResponse, HistoryResponse, ImageInfo, IngestSummary};
