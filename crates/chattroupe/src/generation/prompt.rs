//! Prompt templates for document question answering

use crate::retrieval::ScoredChunk;

/// Exact reply when the context does not contain the answer
pub const FALLBACK_ANSWER: &str = "answer is not available in the context";

/// Prompt builder for PDF questions
pub struct PromptBuilder;

impl PromptBuilder {
    /// Join retrieved chunk texts with blank lines, best match first
    pub fn build_context(chunks: &[ScoredChunk]) -> String {
        chunks
            .iter()
            .map(|c| c.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Fill the question-answering template
    pub fn build_qa_prompt(context: &str, question: &str) -> String {
        format!(
            "Answer the question as detailed as possible from the provided context, make sure to provide all the details, if the answer is not in provided context just say, \"{fallback}\", don't provide the wrong answer\n\n\
             Context:\n {context}?\n\
             Question: \n{question}\n\
             \n\
             Answer:\n",
            fallback = FALLBACK_ANSWER,
            context = context,
            question = question,
        )
    }
}
