//! Grounded answers from retrieved chunks

use std::sync::Arc;

use super::prompt::{PromptBuilder, FALLBACK_ANSWER};
use crate::config::AppConfig;
use crate::error::Result;
use crate::providers::{GenerationRequest, LlmProvider, Turn};
use crate::retrieval::ScoredChunk;

/// Fills the QA template and asks the model
pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LlmProvider>, config: &AppConfig) -> Self {
        Self {
            llm,
            model: config.gemini.qa_model.clone(),
            temperature: config.generation.temperature,
        }
    }

    /// Answer `question` from `chunks`
    ///
    /// With no chunks the fallback is returned without calling the model.
    pub async fn answer(&self, chunks: &[ScoredChunk], question: &str) -> Result<String> {
        if chunks.is_empty() {
            return Ok(FALLBACK_ANSWER.to_string());
        }

        let context = PromptBuilder::build_context(chunks);
        let prompt = PromptBuilder::build_qa_prompt(&context, question);
        tracing::debug!(
            "QA prompt: {} chunk(s), {} chars of context",
            chunks.len(),
            context.len()
        );

        let request = GenerationRequest::new(self.model.clone(), vec![Turn::user_text(prompt)])
            .with_temperature(self.temperature);
        let reply = self.llm.generate(request).await?;

        Ok(normalize_answer(reply))
    }
}

/// Collapse variants of the fallback phrase to the exact phrase
///
/// Anything else is returned verbatim.
pub fn normalize_answer(reply: String) -> String {
    let core = reply
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '“' || c == '”')
        .trim()
        .trim_end_matches('.')
        .trim();

    if core.eq_ignore_ascii_case(FALLBACK_ANSWER) {
        FALLBACK_ANSWER.to_string()
    } else {
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockLlm;
    use crate::types::TextChunk;

    fn scored(text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: TextChunk {
                index: 0,
                text: text.to_string(),
                char_start: 0,
                char_end: text.len(),
            },
            score: 0.0,
        }
    }

    #[test]
    fn test_fallback_variants_are_normalized() {
        for reply in [
            "answer is not available in the context",
            "Answer is not available in the context.",
            "  \"answer is not available in the context\"  \n",
            "ANSWER IS NOT AVAILABLE IN THE CONTEXT",
        ] {
            assert_eq!(normalize_answer(reply.to_string()), FALLBACK_ANSWER);
        }

        let real = "The answer is not available in the context, but here is a guess.";
        assert_eq!(normalize_answer(real.to_string()), real);
    }

    #[tokio::test]
    async fn test_uses_configured_model_and_temperature() {
        let llm = Arc::new(MockLlm::fixed("Paris."));
        let synthesizer = AnswerSynthesizer::new(llm.clone(), &AppConfig::default());

        let answer = synthesizer
            .answer(&[scored("Paris is the capital of France")], "What is the capital?")
            .await
            .unwrap();
        assert_eq!(answer, "Paris.");

        let request = &llm.requests()[0];
        assert_eq!(request.model, AppConfig::default().gemini.qa_model);
        assert_eq!(request.temperature, Some(0.7));
        assert!(request.last_user_text().contains("Paris is the capital of France"));
    }

    #[tokio::test]
    async fn test_literal_answer_vs_irrelevant_context() {
        let llm = Arc::new(MockLlm::grounded());
        let synthesizer = AnswerSynthesizer::new(llm, &AppConfig::default());

        let answer = synthesizer
            .answer(&[scored("The reactor core temperature limit is 550 degrees")], "What is the reactor temperature limit?")
            .await
            .unwrap();
        assert_ne!(answer, FALLBACK_ANSWER);
        assert!(answer.contains("550"));

        let answer = synthesizer
            .answer(&[scored("Bananas are rich in potassium")], "Who designed the bridge?")
            .await
            .unwrap();
        assert_eq!(answer, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_no_chunks_skips_model() {
        let llm = Arc::new(MockLlm::fixed("should not be called"));
        let synthesizer = AnswerSynthesizer::new(llm.clone(), &AppConfig::default());
        assert_eq!(synthesizer.answer(&[], "anything").await.unwrap(), FALLBACK_ANSWER);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_service_failure_is_returned() {
        let llm = Arc::new(MockLlm::failing("quota exceeded"));
        let synthesizer = AnswerSynthesizer::new(llm, &AppConfig::default());
        assert!(synthesizer.answer(&[scored("x")], "y").await.is_err());
    }
}
