//! Fixed-window text chunking with overlap

use crate::config::ChunkingConfig;
use crate::types::TextChunk;

/// Text chunker with configurable size and overlap, both in characters
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Overlap between consecutive chunks
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    ///
    /// `overlap` is clamped below `chunk_size` so the window always advances.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    /// Create from config
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into chunks.
    ///
    /// Chunk `i` covers characters `[i * (size - overlap), i * (size - overlap) + size)`,
    /// truncated at the end of the text. Text of at most `chunk_size` characters,
    /// including the empty string, yields exactly one chunk equal to the input.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        // Byte offset of every char, plus the end of the string
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        let total_chars = boundaries.len() - 1;

        if total_chars <= self.chunk_size {
            return vec![TextChunk {
                index: 0,
                text: text.to_string(),
                char_start: 0,
                char_end: total_chars,
            }];
        }

        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::with_capacity(total_chars / step + 1);
        let mut start = 0usize;

        loop {
            let end = (start + self.chunk_size).min(total_chars);
            chunks.push(TextChunk {
                index: chunks.len() as u32,
                text: text[boundaries[start]..boundaries[end]].to_string(),
                char_start: start,
                char_end: end,
            });

            if end == total_chars {
                break;
            }
            start += step;
        }

        chunks
    }

    /// Rebuild the original text by dropping the overlap from every chunk after the first
    pub fn reassemble(&self, chunks: &[TextChunk]) -> String {
        let mut text = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                text.push_str(&chunk.text);
            } else {
                text.extend(chunk.text.chars().skip(self.overlap));
            }
        }
        text
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = TextChunker::default();
        for text in ["", "a", "The quick brown fox.", &"x".repeat(10_000)] {
            let chunks = chunker.split(text);
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0].text, text);
            assert_eq!(chunks[0].char_start, 0);
        }
    }

    #[test]
    fn test_consecutive_chunks_share_exact_overlap() {
        let chunker = TextChunker::new(10, 3);
        let text: String = ('a'..='z').collect();
        let chunks = chunker.split(&text);

        assert_eq!(chunks[0].text, "abcdefghij");
        assert_eq!(chunks[1].text, "hijklmnopq");
        for pair in chunks.windows(2) {
            let prev_tail: String = pair[0].text.chars().skip(pair[0].char_len() - 3).collect();
            let next_head: String = pair[1].text.chars().take(3).collect();
            assert_eq!(prev_tail, next_head);
            assert_eq!(pair[1].char_start, pair[0].char_end - 3);
        }
        assert_eq!(chunks.last().unwrap().char_end, 26);
    }

    #[test]
    fn test_reassemble_reconstructs_input() {
        let samples = [
            "x".repeat(10_001),
            "lorem ipsum dolor sit amet ".repeat(2_000),
            "héllo wörld - ünïcödé ✓ ".repeat(900),
        ];
        let chunker = TextChunker::default();
        for text in samples.iter() {
            let chunks = chunker.split(text);
            assert!(chunks.len() > 1);
            assert!(chunks.iter().all(|c| c.char_len() <= 10_000));
            assert_eq!(&chunker.reassemble(&chunks), text);
        }

        let small = TextChunker::new(7, 2);
        for len in 0..60 {
            let text: String = "abcdefghijklmnopqrstuvwxyz".chars().cycle().take(len).collect();
            assert_eq!(small.reassemble(&small.split(&text)), text);
        }
    }

    #[test]
    fn test_chunk_indices_are_sequential() {
        let chunker = TextChunker::new(100, 10);
        let text = "0123456789".repeat(100);
        let chunks = chunker.split(&text);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index as usize, i);
        }
        // 1000 chars, step 90: starts at 0, 90, ..., 900 -> 11 chunks
        assert_eq!(chunks.len(), 11);
    }

    #[test]
    fn test_multibyte_boundaries() {
        let chunker = TextChunker::new(4, 1);
        let chunks = chunker.split("日本語のテキスト");
        assert_eq!(chunks[0].text, "日本語の");
        assert_eq!(chunks[1].text, "のテキス");
        assert_eq!(chunks[2].text, "スト");
    }

    #[test]
    fn test_overlap_is_clamped() {
        let chunker = TextChunker::new(5, 9);
        assert_eq!(chunker.overlap(), 4);
        let text = "abcdefghij";
        assert_eq!(chunker.reassemble(&chunker.split(text)), text);
    }
}
