//! chattroupe: chat with your PDFs, ask about images, and talk to Gemini
//!
//! PDFs are split into overlapping chunks, embedded with Gemini and stored in a
//! flat on-disk index. Questions are answered from the closest chunks only.
//! Images are answered by a multimodal model, and general chat streams its
//! reply fragment by fragment. All of it hangs off a [`Session`] that a
//! terminal REPL or the HTTP server drives through an [`Assistant`].

pub mod adapters;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fixtures;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod repl;
pub mod retrieval;
pub mod server;
pub mod session;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use server::ChatServer;
pub use session::{Assistant, Draft, Session, SessionManager};
pub use types::{
    chat::{ChatHistory, ChatMessage, Speaker},
    document::{FileType, SourceDocument, TextChunk},
    response::{AnswerResponse, ImageInfo, IngestSummary},
};
