//! Free-form chat with a streamed reply

use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::config::AppConfig;
use crate::error::Result;
use crate::providers::{FragmentStream, GenerationRequest, LlmProvider, Part, Role, Turn};
use crate::types::{ChatMessage, Speaker};

/// A reply arriving as text fragments
///
/// The stream is lazy and can be consumed once. It ends after the last
/// fragment or after the first error. Every fragment yielded is also
/// appended to [`ChatReply::text`]. Dropping the reply cancels the request.
pub struct ChatReply {
    inner: FragmentStream,
    text: String,
    finished: bool,
}

impl ChatReply {
    pub fn new(inner: FragmentStream) -> Self {
        Self {
            inner,
            text: String::new(),
            finished: false,
        }
    }

    /// Text received so far
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drain the remaining fragments and return the whole reply
    pub async fn collect_text(mut self) -> Result<String> {
        while let Some(fragment) = self.next().await {
            fragment?;
        }
        Ok(self.text)
    }
}

impl Stream for ChatReply {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(fragment))) => {
                this.text.push_str(&fragment);
                Poll::Ready(Some(Ok(fragment)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Sends chat messages to the chat model
pub struct GeneralChat {
    llm: Arc<dyn LlmProvider>,
    model: String,
    include_history: bool,
}

impl GeneralChat {
    pub fn new(llm: Arc<dyn LlmProvider>, config: &AppConfig) -> Self {
        Self {
            llm,
            model: config.gemini.chat_model.clone(),
            include_history: config.chat.include_history,
        }
    }

    /// Start a streamed reply to `message`
    ///
    /// `prior` is the conversation before this message.
    pub async fn send(&self, prior: &[ChatMessage], message: &str) -> Result<ChatReply> {
        let request = self.build_request(prior, message);
        tracing::debug!("Chat request with {} turn(s)", request.contents.len());
        let stream = self.llm.generate_stream(request).await?;
        Ok(ChatReply::new(stream))
    }

    /// Reply to `message` in one piece
    pub async fn complete(&self, prior: &[ChatMessage], message: &str) -> Result<String> {
        self.llm.generate(self.build_request(prior, message)).await
    }

    fn build_request(&self, prior: &[ChatMessage], message: &str) -> GenerationRequest {
        let mut contents: Vec<Turn> = Vec::new();

        if self.include_history {
            for entry in prior {
                let role = match entry.speaker {
                    Speaker::User => Role::User,
                    Speaker::Assistant => Role::Model,
                };
                push_turn(&mut contents, role, &entry.text);
            }
        }
        push_turn(&mut contents, Role::User, message);

        // The API expects the conversation to open with the user
        while contents.first().map(|t| t.role) == Some(Role::Model) {
            contents.remove(0);
        }

        GenerationRequest::new(self.model.clone(), contents)
    }
}

/// Append a turn, merging it into the previous one when the role repeats
fn push_turn(contents: &mut Vec<Turn>, role: Role, text: &str) {
    match contents.last_mut() {
        Some(last) if last.role == role => {
            let merged = format!("{}\n{}", last.text(), text);
            *last = Turn {
                role,
                parts: vec![Part::text(merged)],
            };
        }
        _ => contents.push(Turn {
            role,
            parts: vec![Part::text(text)],
        }),
    }
}
