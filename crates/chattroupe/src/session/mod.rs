//! Per-session state and the handlers that act on it
//!
//! A [`Session`] is plain data owned by whoever drives the interaction (the
//! REPL loop or the server's session map). [`Assistant`] holds the pipelines
//! and exposes one async handler per user action, each taking the session
//! explicitly.

mod assistant;
mod manager;

pub use assistant::{Assistant, PendingChat};
pub use manager::SessionManager;

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::adapters::UploadedImage;
use crate::types::{ChatHistory, SourceDocument, Speaker};

/// Input kept after a recoverable failure so it can be retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Draft {
    /// Re-submit the pending documents
    Documents,
    PdfQuestion(String),
    ImageQuestion(String),
    DescribeImage,
    Chat(String),
}

/// State of one interactive session
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    history: ChatHistory,
    pending_documents: Vec<SourceDocument>,
    image: Option<UploadedImage>,
    index_path: PathBuf,
    draft: Option<Draft>,
    epoch: u64,
}

impl Session {
    /// New empty session whose index lives in `index_path`
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self::with_id(Uuid::new_v4(), index_path)
    }

    pub fn with_id(id: Uuid, index_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            history: ChatHistory::new(),
            pending_documents: Vec::new(),
            image: None,
            index_path: index_path.into(),
            draft: None,
            epoch: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn image(&self) -> Option<&UploadedImage> {
        self.image.as_ref()
    }

    /// Documents uploaded but not yet indexed successfully
    pub fn pending_documents(&self) -> &[SourceDocument] {
        &self.pending_documents
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    /// Take the draft for a retry
    pub fn take_draft(&mut self) -> Option<Draft> {
        self.draft.take()
    }

    /// Changes on every clear
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Append the reply of a chat turn started in `epoch`
    ///
    /// Replies from before the last clear are dropped. Returns whether the
    /// reply was recorded.
    pub fn complete_chat(&mut self, epoch: u64, reply: &str) -> bool {
        if epoch != self.epoch {
            tracing::debug!("Dropping chat reply from a cleared conversation");
            return false;
        }
        self.history.push(Speaker::Assistant, reply);
        true
    }

    /// Record a chat turn that broke off mid-stream
    ///
    /// Whatever text arrived is kept in the history and the message is kept
    /// as a draft.
    pub fn fail_chat(&mut self, epoch: u64, message: &str, partial: &str) {
        if epoch != self.epoch {
            return;
        }
        if !partial.trim().is_empty() {
            self.history.push(Speaker::Assistant, partial);
        }
        self.draft = Some(Draft::Chat(message.to_string()));
    }

    /// Reset history, uploads and drafts
    pub fn clear(&mut self) {
        self.history.clear();
        self.pending_documents.clear();
        self.image = None;
        self.draft = None;
        self.epoch += 1;
    }

    fn set_draft(&mut self, draft: Draft) {
        self.draft = Some(draft);
    }

    fn clear_draft_if(&mut self, predicate: impl Fn(&Draft) -> bool) {
        if self.draft.as_ref().is_some_and(predicate) {
            self.draft = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_resets_everything() {
        let mut session = Session::new("vector_index");
        session.history.push(Speaker::User, "hello");
        session
            .pending_documents
            .push(SourceDocument::new("a.pdf", b"%PDF".to_vec()));
        session.set_draft(Draft::PdfQuestion("why?".into()));

        let before = session.epoch();
        session.clear();

        assert!(session.history().is_empty());
        assert!(session.pending_documents().is_empty());
        assert!(session.image().is_none());
        assert!(session.draft().is_none());
        assert_eq!(session.epoch(), before + 1);
        assert_eq!(session.index_path(), Path::new("vector_index"));
    }

    #[test]
    fn test_late_reply_after_clear_is_dropped() {
        let mut session = Session::new("vector_index");
        session.history.push(Speaker::User, "tell me a story");
        let epoch = session.epoch();

        session.clear();
        assert!(!session.complete_chat(epoch, "Once upon a time"));
        assert!(session.history().is_empty());

        session.history.push(Speaker::User, "hi");
        assert!(session.complete_chat(session.epoch(), "hello"));
        assert_eq!(session.history().render(), "You: hi\nGemini: hello");
    }

    #[test]
    fn test_failed_chat_keeps_partial_reply_and_draft() {
        let mut session = Session::new("vector_index");
        session.history.push(Speaker::User, "count");
        session.fail_chat(session.epoch(), "count", "one two ");

        assert_eq!(session.history().len(), 2);
        assert_eq!(session.take_draft(), Some(Draft::Chat("count".into())));
        assert!(session.draft().is_none());
    }
}
