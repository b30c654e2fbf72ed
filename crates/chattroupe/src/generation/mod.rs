//! Answer generation for document questions

pub mod prompt;
pub mod synthesizer;

pub use prompt::{PromptBuilder, FALLBACK_ANSWER};
pub use synthesizer::{normalize_answer, AnswerSynthesizer};
