//! Document ingestion: PDF text extraction, chunking and indexing

mod chunker;
mod parser;
mod processor;

pub use chunker::TextChunker;
pub use parser::{ExtractedDocument, ExtractedText, TextExtractor};
pub use processor::EmbeddingIndexer;

