//! Gemini client for embeddings, generation and streaming chat
//!
//! Talks to the Generative Language API with an API key. Non-streaming calls
//! retry connection failures, rate limits and server errors with exponential
//! backoff; streaming calls are never retried once fragments may have been
//! delivered.

mod stream;
mod types;

pub use stream::{decode_sse_stream, SseDecoder};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::GeminiConfig;
use crate::error::{Error, Result};
use crate::providers::embedding::EmbeddingProvider;
use crate::providers::llm::{FragmentStream, GenerationRequest, LlmProvider};
use types::{
    ApiErrorResponse, BatchEmbedContentsRequest, BatchEmbedContentsResponse, Content,
    EmbedContentRequest, EmbedContentResponse, GenerateContentRequest, GenerateContentResponse,
    GenerationParams,
};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Upper bound of the batchEmbedContents endpoint
const MAX_EMBED_BATCH: usize = 100;

const TASK_DOCUMENT: &str = "RETRIEVAL_DOCUMENT";
const TASK_QUERY: &str = "RETRIEVAL_QUERY";

/// Failure of a single attempt
struct AttemptError {
    error: Error,
    retryable: bool,
}

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
    api_key: String,
}

impl GeminiClient {
    /// Create a new client
    ///
    /// The key comes from `GeminiConfig::api_key`; an absent key is a
    /// configuration error.
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} is not set",
                    crate::config::API_KEY_ENV
                ))
            })?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!(
            "{}/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    fn model_path(model: &str) -> String {
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        }
    }

    fn build_generate_body(request: &GenerationRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: request.contents.iter().map(Content::from).collect(),
            generation_config: request
                .temperature
                .map(|temperature| GenerationParams { temperature }),
        }
    }

    /// POST a JSON body, retrying transient failures with exponential backoff
    async fn post_json<B, R>(&self, url: &str, body: &B, to_error: fn(String) -> Error) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let mut attempt = 0u32;
        loop {
            match self.post_once(url, body, to_error).await {
                Ok(response) => return Ok(response),
                Err(failure) if failure.retryable && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    tracing::warn!(
                        "Gemini request failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.config.max_retries + 1,
                        delay,
                        failure.error
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    async fn post_once<B, R>(
        &self,
        url: &str,
        body: &B,
        to_error: fn(String) -> Error,
    ) -> std::result::Result<R, AttemptError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(body)
            .send()
            .await
            .map_err(|e| AttemptError {
                retryable: e.is_connect() || e.is_timeout(),
                error: to_error(format!("Gemini request failed: {}", e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError {
                retryable: is_retryable_status(status),
                error: to_error(describe_failure(status, &body)),
            });
        }

        response.json::<R>().await.map_err(|e| AttemptError {
            retryable: false,
            error: to_error(format!("Failed to parse Gemini response: {}", e)),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Self::model_path(&self.config.embedding_model);
        let body = BatchEmbedContentsRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: model.clone(),
                    content: Content::text(text),
                    task_type: TASK_DOCUMENT,
                })
                .collect(),
        };

        let url = self.model_url(&self.config.embedding_model, "batchEmbedContents");
        let response: BatchEmbedContentsResponse =
            self.post_json(&url, &body, Error::Embedding).await?;

        if response.embeddings.len() != texts.len() {
            return Err(Error::embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(err) => format!("Gemini returned {}: {}", status, err.error.message),
        Err(_) => format!("Gemini returned {}: {}", status, body.trim()),
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.config.embed_batch_size.clamp(1, MAX_EMBED_BATCH);
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }

        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbedContentRequest {
            model: Self::model_path(&self.config.embedding_model),
            content: Content::text(text),
            task_type: TASK_QUERY,
        };

        let url = self.model_url(&self.config.embedding_model, "embedContent");
        let response: EmbedContentResponse = self.post_json(&url, &body, Error::Embedding).await?;
        Ok(response.embedding.values)
    }

    fn model(&self) -> &str {
        &self.config.embedding_model
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[async_trait]
impl LlmProvider for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let body = Self::build_generate_body(&request);
        let url = self.model_url(&request.model, "generateContent");

        tracing::debug!("Generating with {} ({} turns)", request.model, request.contents.len());
        let response: GenerateContentResponse = self.post_json(&url, &body, Error::Llm).await?;

        if let Some(reason) = response.block_reason() {
            return Err(Error::llm(format!("Prompt blocked by Gemini: {}", reason)));
        }
        if response.candidates.is_empty() {
            return Err(Error::llm("No candidates in Gemini response"));
        }

        let text = response.text();
        if text.is_empty() {
            tracing::warn!(
                "Gemini returned no text (finish reason: {})",
                response.finish_reason().unwrap_or("unknown")
            );
        }
        Ok(text)
    }

    async fn generate_stream(&self, request: GenerationRequest) -> Result<FragmentStream> {
        let body = Self::build_generate_body(&request);
        let url = format!(
            "{}?alt=sse",
            self.model_url(&request.model, "streamGenerateContent")
        );

        tracing::debug!("Streaming with {} ({} turns)", request.model, request.contents.len());
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let send = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send();

        // Bounds the wait for response headers; fragments may take longer
        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| {
                Error::llm(format!(
                    "Gemini stream did not start within {}s",
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::llm(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::llm(describe_failure(status, &body)));
        }

        Ok(decode_sse_stream(response.bytes_stream()))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
