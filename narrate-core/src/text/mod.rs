//! Text processing for TTS: sections, sentence splitting and chunking.

pub mod chunker;
mod sentences;

pub use chunker::{ChunkedDocument, ChunkerLimits, TextChunker, join_segments};
pub use sentences::split_into_sentences;

/// Page separator emitted by text extractors such as pdftotext.
const FORM_FEED: char = '\u{0c}';

/// A chunk of text ready for a single synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    /// Position in the whole conversion, starting at 0
    pub index: usize,
    /// The text content
    pub text: String,
}

impl TextSegment {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A titled run of text; chapters are derived from sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: Option<String>,
    pub text: String,
}

impl Section {
    pub fn new(title: Option<String>, text: impl Into<String>) -> Self {
        Self {
            title,
            text: text.into(),
        }
    }
}

/// The full input of one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub sections: Vec<Section>,
}

impl Document {
    /// Build a document from plain text, one untitled section per page.
    ///
    /// Pages are separated by form feeds. Text without form feeds becomes a
    /// single section.
    pub fn from_text(text: &str) -> Self {
        let sections = text
            .split(FORM_FEED)
            .map(|page| Section::new(None, page))
            .collect();
        Self { sections }
    }

    pub fn push(&mut self, title: Option<String>, text: impl Into<String>) {
        self.sections.push(Section::new(title, text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_segment_creation() {
        let segment = TextSegment::new(1, "Hello world");
        assert_eq!(segment.index, 1);
        assert_eq!(segment.text, "Hello world");
        assert_eq!(segment.len(), 11);
    }

    #[test]
    fn test_segment_len_counts_chars() {
        let segment = TextSegment::new(0, "café");
        assert_eq!(segment.len(), 4);
    }

    #[test]
    fn test_document_from_text_splits_pages() {
        let doc = Document::from_text("Page one.\u{0c}Page two.\u{0c}");
        assert_eq!(doc.sections.len(), 3);
        assert_eq!(doc.sections[0].text, "Page one.");
        assert_eq!(doc.sections[1].text, "Page two.");
        assert!(doc.sections[2].text.is_empty());
        assert!(doc.sections.iter().all(|s| s.title.is_none()));
    }

    #[test]
    fn test_document_without_form_feed() {
        let doc = Document::from_text("Just one page.\n\nTwo paragraphs.");
        assert_eq!(doc.sections.len(), 1);
    }
}
