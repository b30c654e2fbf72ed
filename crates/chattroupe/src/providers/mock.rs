//! In-process providers for tests and offline runs
//!
//! `MockEmbedder` hashes words into a fixed-size bag-of-words vector, so texts
//! sharing vocabulary land close together. `MockLlm` answers document
//! questions by quoting the context sentence that best matches the question.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::providers::embedding::EmbeddingProvider;
use crate::providers::llm::{FragmentStream, GenerationRequest, LlmProvider, Part};

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "how",
    "in", "is", "it", "its", "of", "on", "or", "the", "this", "that", "to", "was", "what", "when",
    "where", "which", "who", "why", "with",
];

fn content_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// FNV-1a, stable across runs and platforms
fn bucket(word: &str, dimensions: usize) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in word.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % dimensions as u64) as usize
}

/// Deterministic bag-of-words embedder
pub struct MockEmbedder {
    dimensions: usize,
    fail: bool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// An embedder whose every call fails like an unreachable service
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(64)
        }
    }

    /// Number of embedding calls made
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in content_words(text) {
            vector[bucket(&word, self.dimensions)] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }

    fn check(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(Error::embedding("mock embedding service unavailable"))
        } else {
            Ok(())
        }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.check()?;
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.check()?;
        Ok(self.vector(text))
    }

    fn model(&self) -> &str {
        "mock-embedding"
    }

    fn name(&self) -> &str {
        "mock"
    }
}

enum Behavior {
    Grounded,
    Fixed(String),
    Fail(String),
}

/// Scripted generation backend that records every request
pub struct MockLlm {
    behavior: Behavior,
    fail_stream_after: Option<usize>,
    fragment_delay: Option<Duration>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockLlm {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            fail_stream_after: None,
            fragment_delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers only from the prompt context and describes inline images
    pub fn grounded() -> Self {
        Self::with_behavior(Behavior::Grounded)
    }

    /// Always replies with `reply`
    pub fn fixed(reply: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Fixed(reply.into()))
    }

    /// Every call fails with an LLM error
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Fail(message.into()))
    }

    /// Streams break with an error after `fragments` fragments
    pub fn with_stream_failure_after(mut self, fragments: usize) -> Self {
        self.fail_stream_after = Some(fragments);
        self
    }

    /// Pause before each streamed fragment
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = Some(delay);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn reply(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().push(request.clone());

        match &self.behavior {
            Behavior::Fixed(reply) => Ok(reply.clone()),
            Behavior::Fail(message) => Err(Error::llm(message.clone())),
            Behavior::Grounded => Ok(grounded_reply(request)),
        }
    }
}

fn grounded_reply(request: &GenerationRequest) -> String {
    let last = request.contents.last();
    let image = last.and_then(|turn| {
        turn.parts.iter().find_map(|p| match p {
            Part::InlineData { mime_type, data } => Some((mime_type.clone(), data.len())),
            Part::Text(_) => None,
        })
    });
    let text = request.last_user_text();

    if let Some((mime_type, size)) = image {
        return if text.trim().is_empty() {
            format!("An image ({}, {} bytes).", mime_type, size)
        } else {
            format!("About the image ({}): {}", mime_type, text.trim())
        };
    }

    match split_prompt(&text) {
        Some((context, question)) => answer_from_context(context, question),
        None => format!("You said: {}", text.trim()),
    }
}

/// Pull context and question out of the document QA prompt
fn split_prompt(prompt: &str) -> Option<(&str, &str)> {
    let context_start = prompt.find("Context:")? + "Context:".len();
    let question_marker = prompt.rfind("Question:")?;
    let answer_marker = prompt.rfind("Answer:")?;
    if question_marker < context_start || answer_marker < question_marker {
        return None;
    }
    let question_start = question_marker + "Question:".len();
    Some((
        &prompt[context_start..question_marker],
        &prompt[question_start..answer_marker],
    ))
}

fn answer_from_context(context: &str, question: &str) -> String {
    let wanted: HashSet<String> = content_words(question).into_iter().collect();

    let best = context
        .split(|c: char| c == '.' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|sentence| {
            let words: HashSet<String> = content_words(sentence).into_iter().collect();
            (wanted.intersection(&words).count(), sentence)
        })
        .filter(|(score, _)| *score > 0)
        .max_by_key(|(score, _)| *score);

    match best {
        Some((_, sentence)) => format!("{}.", sentence),
        // Callers normalize this to the exact fallback
        None => "Answer is not available in the context.".to_string(),
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        self.reply(&request)
    }

    async fn generate_stream(&self, request: GenerationRequest) -> Result<FragmentStream> {
        let reply = self.reply(&request)?;

        let mut fragments: VecDeque<Result<String>> = reply
            .split_inclusive(' ')
            .map(|f| Ok(f.to_string()))
            .collect();
        if let Some(after) = self.fail_stream_after {
            fragments.truncate(after);
            fragments.push_back(Err(Error::llm("mock stream interrupted")));
        }

        let delay = self.fragment_delay;
        let stream = futures_util::stream::unfold(fragments, move |mut pending| async move {
            let next = pending.pop_front()?;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Some((next, pending))
        });

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
