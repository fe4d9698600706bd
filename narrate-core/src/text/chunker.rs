//! Text chunking for TTS processing.

use super::sentences::split_into_sentences;
use super::{Section, TextSegment};
use crate::error::{NarrateError, Result};

/// Maximum chunk size in characters.
pub const MAX_CHUNK_LENGTH: usize = 500;

/// Chunks shorter than this keep absorbing sentences even past the maximum.
pub const MIN_CHUNK_LENGTH: usize = 100;

/// Paragraph separator used when splitting and when joining segments back.
const PARAGRAPH_BREAK: &str = "\n\n";

/// Length bounds for a chunk, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerLimits {
    pub min: usize,
    pub max: usize,
}

impl ChunkerLimits {
    pub fn new(min: usize, max: usize) -> Result<Self> {
        if max == 0 || min > max {
            return Err(NarrateError::InvalidLimits { min, max });
        }
        Ok(Self { min, max })
    }
}

impl Default for ChunkerLimits {
    fn default() -> Self {
        Self {
            min: MIN_CHUNK_LENGTH,
            max: MAX_CHUNK_LENGTH,
        }
    }
}

/// Segments of a whole document plus where each section starts.
#[derive(Debug, Clone, Default)]
pub struct ChunkedDocument {
    pub segments: Vec<TextSegment>,
    /// `(section index, first segment index)` for every section that produced
    /// at least one segment, in order.
    pub section_starts: Vec<(usize, usize)>,
}

/// Splits text into segments that are safe for one synthesis call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextChunker {
    limits: ChunkerLimits,
}

impl TextChunker {
    pub fn new(limits: ChunkerLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> ChunkerLimits {
        self.limits
    }

    /// Split text into ordered segments, indexed from 0.
    pub fn chunk(&self, text: &str) -> Vec<TextSegment> {
        self.chunk_paragraphs(text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| TextSegment::new(index, text))
            .collect()
    }

    /// Chunk every section with one running index sequence.
    pub fn chunk_sections(&self, sections: &[Section]) -> ChunkedDocument {
        let mut doc = ChunkedDocument::default();

        for (section_idx, section) in sections.iter().enumerate() {
            let pieces = self.chunk_paragraphs(&section.text);
            if pieces.is_empty() {
                continue;
            }

            doc.section_starts.push((section_idx, doc.segments.len()));
            for text in pieces {
                let index = doc.segments.len();
                doc.segments.push(TextSegment::new(index, text));
            }
        }

        doc
    }

    fn chunk_paragraphs(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();

        for paragraph in text.split(PARAGRAPH_BREAK) {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }

            if char_len(paragraph) <= self.limits.max {
                chunks.push(paragraph.to_string());
                continue;
            }

            self.pack_sentences(split_into_sentences(paragraph), &mut chunks);
        }

        chunks
    }

    /// Greedily pack sentences, never flushing a buffer below the minimum.
    fn pack_sentences(&self, sentences: Vec<String>, chunks: &mut Vec<String>) {
        let mut current = String::new();
        let mut current_len = 0;

        for sentence in sentences {
            let sentence_len = char_len(&sentence);

            if current.is_empty() {
                current = sentence;
                current_len = sentence_len;
                continue;
            }

            let joined_len = current_len + 1 + sentence_len;
            if joined_len <= self.limits.max || current_len < self.limits.min {
                current.push(' ');
                current.push_str(&sentence);
                current_len = joined_len;
            } else {
                chunks.push(std::mem::replace(&mut current, sentence));
                current_len = sentence_len;
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }
    }
}

/// Rebuild text from segments, one paragraph per segment.
pub fn join_segments(segments: &[TextSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_BREAK)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
