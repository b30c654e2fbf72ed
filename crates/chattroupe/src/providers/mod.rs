//! Provider abstractions for embeddings and generation
//!
//! Everything that talks to a model goes through these traits, so the
//! pipelines can run against Gemini or the in-process mocks.

pub mod embedding;
pub mod gemini;
pub mod llm;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use embedding::EmbeddingProvider;
pub use gemini::GeminiClient;
pub use llm::{FragmentStream, GenerationRequest, LlmProvider, Part, Role, Turn};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockEmbedder, MockLlm};
