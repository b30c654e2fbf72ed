//! Handlers for every user action

use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

use super::{Draft, Session};
use crate::adapters::{ChatReply, GeneralChat, ImageQa, UploadedImage};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::generation::AnswerSynthesizer;
use crate::ingestion::EmbeddingIndexer;
use crate::providers::{EmbeddingProvider, GeminiClient, LlmProvider};
use crate::retrieval::Retriever;
use crate::types::{AnswerResponse, ImageInfo, IngestSummary, SourceDocument, Speaker};

/// A chat turn whose reply is still streaming
///
/// Consume `reply`, then hand the text back with
/// [`Session::complete_chat`] (or [`Session::fail_chat`]) using `epoch`.
pub struct PendingChat {
    pub reply: ChatReply,
    pub epoch: u64,
    pub message: String,
}

/// All pipelines of the app, shared by every session
pub struct Assistant {
    indexer: EmbeddingIndexer,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    image_qa: ImageQa,
    chat: GeneralChat,
}

impl Assistant {
    /// Wire the pipelines to explicit providers
    pub fn new(
        config: &AppConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        tracing::info!(
            "Assistant using {} embeddings and {} generation",
            embedder.name(),
            llm.name()
        );
        Self {
            indexer: EmbeddingIndexer::new(embedder.clone(), config),
            retriever: Retriever::new(embedder, &config.retrieval),
            synthesizer: AnswerSynthesizer::new(llm.clone(), config),
            image_qa: ImageQa::new(llm.clone(), config),
            chat: GeneralChat::new(llm, config),
        }
    }

    /// Wire the pipelines to Gemini
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = Arc::new(GeminiClient::new(&config.gemini)?);
        Ok(Self::new(config, client.clone(), client))
    }

    /// Submit & Process
    ///
    /// A non-empty `documents` replaces the pending set; an empty one
    /// retries the pending set. The pending set is dropped only once the
    /// index has been written.
    pub async fn submit_documents(
        &self,
        session: &mut Session,
        documents: Vec<SourceDocument>,
    ) -> Result<IngestSummary> {
        if !documents.is_empty() {
            session.pending_documents = documents;
        }
        if session.pending_documents.is_empty() {
            return Err(Error::NoDocuments);
        }

        match self
            .indexer
            .index_documents(&session.pending_documents, &session.index_path)
            .await
        {
            Ok(summary) => {
                session.pending_documents.clear();
                session.clear_draft_if(|d| matches!(d, Draft::Documents));
                Ok(summary)
            }
            Err(e) => {
                tracing::error!("Document processing failed: {}", e);
                session.set_draft(Draft::Documents);
                Err(e)
            }
        }
    }

    /// Answer a question from the indexed documents
    pub async fn ask_pdf(&self, session: &mut Session, question: &str) -> Result<AnswerResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::EmptyInput("a question".to_string()));
        }

        let start = Instant::now();
        let result = async {
            let chunks = self.retriever.retrieve(&session.index_path, question).await?;
            let answer = self.synthesizer.answer(&chunks, question).await?;
            Ok::<_, Error>((answer, chunks.len()))
        }
        .await;

        match result {
            Ok((answer, chunks_used)) => {
                session.clear_draft_if(|d| matches!(d, Draft::PdfQuestion(_)));
                let processing_time_ms = start.elapsed().as_millis() as u64;
                tracing::info!(
                    "Answered PDF question with {} chunk(s) in {}ms",
                    chunks_used,
                    processing_time_ms
                );
                Ok(AnswerResponse {
                    answer,
                    chunks_used,
                    processing_time_ms,
                })
            }
            Err(e) => {
                tracing::error!("PDF question failed: {}", e);
                session.set_draft(Draft::PdfQuestion(question.to_string()));
                Err(e)
            }
        }
    }

    /// Replace the session's image
    pub async fn set_image(
        &self,
        session: &mut Session,
        filename: String,
        data: Bytes,
    ) -> Result<ImageInfo> {
        let image = tokio::task::spawn_blocking(move || UploadedImage::decode(filename, data))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        let info = image.info();
        tracing::info!(
            "Image {} uploaded ({}x{}, {} bytes)",
            info.filename,
            info.width,
            info.height,
            info.size_bytes
        );
        session.image = Some(image);
        Ok(info)
    }

    /// Ask a question about the uploaded image
    pub async fn ask_image(&self, session: &mut Session, question: &str) -> Result<AnswerResponse> {
        let draft = if question.trim().is_empty() {
            Draft::DescribeImage
        } else {
            Draft::ImageQuestion(question.trim().to_string())
        };
        self.run_image(session, Some(question), draft).await
    }

    /// "Tell me about the image": send the image alone
    pub async fn describe_image(&self, session: &mut Session) -> Result<AnswerResponse> {
        self.run_image(session, None, Draft::DescribeImage).await
    }

    async fn run_image(
        &self,
        session: &mut Session,
        question: Option<&str>,
        draft: Draft,
    ) -> Result<AnswerResponse> {
        let image = session.image.as_ref().ok_or(Error::NoImage)?;
        let start = Instant::now();

        match self.image_qa.ask(image, question).await {
            Ok(answer) => {
                session.clear_draft_if(|d| {
                    matches!(d, Draft::ImageQuestion(_) | Draft::DescribeImage)
                });
                Ok(AnswerResponse {
                    answer,
                    chunks_used: 0,
                    processing_time_ms: start.elapsed().as_millis() as u64,
                })
            }
            Err(e) => {
                tracing::error!("Image question failed: {}", e);
                session.set_draft(draft);
                Err(e)
            }
        }
    }

    /// Send a chat message and start streaming the reply
    ///
    /// The message joins the history as soon as the model accepts it.
    pub async fn begin_chat(&self, session: &mut Session, message: &str) -> Result<PendingChat> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::EmptyInput("a message".to_string()));
        }

        match self.chat.send(session.history.messages(), message).await {
            Ok(reply) => {
                session.history.push(Speaker::User, message);
                session.clear_draft_if(|d| matches!(d, Draft::Chat(_)));
                Ok(PendingChat {
                    reply,
                    epoch: session.epoch,
                    message: message.to_string(),
                })
            }
            Err(e) => {
                tracing::error!("Chat request failed: {}", e);
                session.set_draft(Draft::Chat(message.to_string()));
                Err(e)
            }
        }
    }

    /// Clear the conversation and uploads
    pub fn clear(&self, session: &mut Session) {
        tracing::info!("Clearing session {}", session.id);
        session.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{build_pdf, encode_image as encode};
    use crate::providers::{MockEmbedder, MockLlm};
    use futures_util::StreamExt;

    fn assistant(llm: MockLlm) -> (Assistant, Arc<MockLlm>) {
        let llm = Arc::new(llm);
        let assistant = Assistant::new(
            &AppConfig::default(),
            Arc::new(MockEmbedder::default()),
            llm.clone(),
        );
        (assistant, llm)
    }

    #[tokio::test]
    async fn test_question_before_upload_is_no_index() {
        let dir = tempfile::tempdir().unwrap();
        let (assistant, _) = assistant(MockLlm::grounded());
        let mut session = Session::new(dir.path());

        let err = assistant.ask_pdf(&mut session, "What is this?").await.unwrap_err();
        assert!(matches!(err, Error::NoIndex { .. }));
        assert_eq!(session.draft(), Some(&Draft::PdfQuestion("What is this?".into())));
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_pending_documents() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlm::grounded());
        let config = AppConfig::default();
        let broken = Assistant::new(&config, Arc::new(MockEmbedder::failing()), llm.clone());
        let working = Assistant::new(&config, Arc::new(MockEmbedder::default()), llm);
        let mut session = Session::new(dir.path());

        let docs = vec![SourceDocument::new(
            "notes.pdf",
            build_pdf(&["Meeting moved to Friday"]),
        )];
        assert!(broken.submit_documents(&mut session, docs).await.is_err());
        assert_eq!(session.pending_documents().len(), 1);
        assert_eq!(session.draft(), Some(&Draft::Documents));

        // Retry without re-uploading
        let summary = working.submit_documents(&mut session, Vec::new()).await.unwrap();
        assert_eq!(summary.documents, vec!["notes.pdf"]);
        assert!(session.pending_documents().is_empty());
        assert!(session.draft().is_none());

        assert!(matches!(
            working.submit_documents(&mut session, Vec::new()).await,
            Err(Error::NoDocuments)
        ));
    }

    #[tokio::test]
    async fn test_image_questions_require_an_image() {
        let (assistant, llm) = assistant(MockLlm::grounded());
        let mut session = Session::new("unused");

        assert!(matches!(
            assistant.describe_image(&mut session).await,
            Err(Error::NoImage)
        ));

        let png = encode(3, 2, image::ImageFormat::Png);
        let info = assistant
            .set_image(&mut session, "chart.png".into(), Bytes::from(png))
            .await
            .unwrap();
        assert_eq!((info.width, info.height), (3, 2));

        let answer = assistant.ask_image(&mut session, "Is it a chart?").await.unwrap();
        assert!(answer.answer.contains("Is it a chart?"));
        let described = assistant.describe_image(&mut session).await.unwrap();
        assert!(described.answer.starts_with("An image (image/png"));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_chat_turn_appends_one_reply() {
        let (assistant, _) = assistant(MockLlm::fixed("Hi there, how can I help?"));
        let mut session = Session::new("unused");

        let mut pending = assistant.begin_chat(&mut session, "hello").await.unwrap();
        assert_eq!(session.history().len(), 1);

        let mut fragments = 0;
        while let Some(fragment) = pending.reply.next().await {
            fragment.unwrap();
            fragments += 1;
        }
        assert!(fragments > 1);
        assert!(session.complete_chat(pending.epoch, pending.reply.text()));

        assert_eq!(
            session.history().render(),
            "You: hello\nGemini: Hi there, how can I help?"
        );
    }

    #[tokio::test]
    async fn test_clear_mid_conversation_starts_fresh() {
        let (assistant, llm) = assistant(MockLlm::fixed("reply"));
        let mut session = Session::new("unused");

        let pending = assistant.begin_chat(&mut session, "first").await.unwrap();
        assistant.clear(&mut session);
        let text = pending.reply.collect_text().await.unwrap();
        assert!(!session.complete_chat(pending.epoch, &text));
        assert!(session.history().is_empty());

        let pending = assistant.begin_chat(&mut session, "second").await.unwrap();
        let text = pending.reply.collect_text().await.unwrap();
        session.complete_chat(pending.epoch, &text);
        assert_eq!(session.history().render(), "You: second\nGemini: reply");

        // The fresh conversation does not carry the cleared turn
        assert_eq!(llm.requests()[1].contents.len(), 1);
    }

    #[tokio::test]
    async fn test_chat_failure_keeps_draft() {
        let (assistant, _) = assistant(MockLlm::failing("quota exceeded"));
        let mut session = Session::new("unused");

        let err = assistant.begin_chat(&mut session, "hello").await.err().unwrap();
        assert!(matches!(err, Error::Llm(_)));
        assert!(session.history().is_empty());
        assert_eq!(session.draft(), Some(&Draft::Chat("hello".into())));

        assert!(matches!(
            assistant.begin_chat(&mut session, "   ").await,
            Err(Error::EmptyInput(_))
        ));
    }
}
