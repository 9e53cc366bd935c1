//! Splitting document text into overlapping chunks
//!
//! Sizes are counted in characters. A chunk ends on the strongest boundary
//! found close to its size limit: a blank line, then a sentence end, then
//! any whitespace. Only a run of text with no whitespace at all is cut
//! mid-word. The next chunk starts `overlap_size` characters before the end
//! of the previous one, moved forward to the start of a word.

use crate::error::ChunkingError;
use crate::types::DocumentChunk;

/// Deterministic, restartable text chunker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    max_chunk_size: usize,
    overlap_size: usize,
}

impl TextChunker {
    /// Create a new text chunker
    pub fn new(max_chunk_size: usize, overlap_size: usize) -> Result<Self, ChunkingError> {
        if max_chunk_size == 0 || max_chunk_size <= overlap_size {
            return Err(ChunkingError {
                max_chunk_size,
                overlap_size,
            });
        }
        Ok(Self {
            max_chunk_size,
            overlap_size,
        })
    }

    /// Maximum chunk size in characters
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Overlap between consecutive chunks in characters
    pub fn overlap_size(&self) -> usize {
        self.overlap_size
    }

    /// Chunk the given text
    pub fn chunk(&self, text: &str) -> Vec<DocumentChunk> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();

        if total <= self.max_chunk_size {
            return vec![DocumentChunk {
                index: 0,
                text: text.to_string(),
                start: 0,
                end: total,
                overlap: 0,
            }];
        }

        // Byte offset of every char position, plus the end of the text
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(byte, _)| byte)
            .chain(std::iter::once(text.len()))
            .collect();

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut overlap = 0;

        loop {
            let limit = start + self.max_chunk_size;
            let end = if limit >= total {
                total
            } else {
                self.find_break(&chars, start, limit)
            };

            chunks.push(DocumentChunk {
                index: chunks.len(),
                text: text[offsets[start]..offsets[end]].to_string(),
                start,
                end,
                overlap,
            });

            if end == total {
                break;
            }

            let next = snap_to_word_start(&chars, end - self.overlap_size, end);
            overlap = end - next;
            start = next;
        }

        chunks
    }

    /// Pick the end of a chunk starting at `start` with hard limit `limit`
    ///
    /// The result lies in `(start + overlap_size, limit]`, which keeps the
    /// next chunk's start strictly after `start`.
    fn find_break(&self, chars: &[char], start: usize, limit: usize) -> usize {
        let floor = start + self.overlap_size + 1;
        // Prefer strong boundaries only in the back half of the window
        let preferred_floor = floor.max(start + self.max_chunk_size / 2);

        let candidates = |lowest: usize, accept: &dyn Fn(usize) -> bool| {
            (lowest.max(1)..=limit).rev().find(|&cut| accept(cut))
        };

        let paragraph = |cut: usize| {
            cut >= start + 2 && chars[cut - 1] == '\n' && chars[cut - 2] == '\n'
        };
        let sentence = |cut: usize| {
            cut >= start + 2
                && chars[cut - 1].is_whitespace()
                && matches!(chars[cut - 2], '.' | '!' | '?')
        };
        let line = |cut: usize| chars[cut - 1] == '\n';
        let word = |cut: usize| chars[cut - 1].is_whitespace() && !chars[cut].is_whitespace();

        candidates(preferred_floor, &paragraph)
            .or_else(|| candidates(preferred_floor, &sentence))
            .or_else(|| candidates(preferred_floor, &line))
            .or_else(|| candidates(floor, &word))
            .unwrap_or(limit)
    }
}

/// Move `pos` forward to the start of a word, never past `end`
fn snap_to_word_start(chars: &[char], mut pos: usize, end: usize) -> usize {
    while pos < end && pos > 0 && !chars[pos - 1].is_whitespace() {
        pos += 1;
    }
    pos
}

/// Rebuild the source text from its chunks by dropping each overlap
pub fn reassemble(chunks: &[DocumentChunk]) -> String {
    chunks.iter().map(DocumentChunk::fresh_text).collect()
}
