//! The canonical linearized document model.
//!
//! Every format adapter produces the same thing: an ordered stream of
//! [`Word`]s annotated with paragraph and page position, plus the index
//! arrays a playback layer needs to navigate by paragraph or page. A
//! [`Document`] is constructed once per parsed file through a
//! [`DocumentBuilder`], which enforces the structural invariants (strictly
//! increasing start arrays beginning at 0, every word inside exactly one
//! paragraph and one page). After construction the stream is immutable except
//! for page indices, which the page-merge post-processor may rewrite.

#[cfg(feature = "serde")]
use serde::Serialize;

/// Inline formatting carried by a word.
///
/// Threaded down tag-tree recursion as an immutable snapshot; sibling
/// subtrees never share mutable formatting state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    pub italic: bool,
    pub bold: bool,
}

impl Style {
    pub fn italic(self) -> Self {
        Self { italic: true, ..self }
    }

    pub fn bold(self) -> Self {
        Self { bold: true, ..self }
    }
}

/// One atomic display unit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Word {
    /// Display text. Empty only for image placeholders.
    pub text: String,
    /// Index of the paragraph this word belongs to.
    pub paragraph: u32,
    /// Index of the page this word belongs to. Rewritten in place by the
    /// page-merge post-processor; immutable otherwise.
    pub page: u32,
    pub italic: bool,
    pub bold: bool,
}

impl Word {
    /// Whether this word stands in for an image rather than readable text.
    pub fn is_image_placeholder(&self) -> bool {
        self.text.is_empty()
    }
}

/// A parsed file, flattened into an ordered word stream.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Document {
    pub words: Vec<Word>,
    /// Word index where each paragraph starts. Strictly increasing,
    /// `paragraph_starts[0] == 0` whenever any words exist.
    pub paragraph_starts: Vec<u32>,
    /// Word index where each page starts. Same invariants.
    pub page_starts: Vec<u32>,
}

impl Document {
    pub fn total_words(&self) -> usize {
        self.words.len()
    }

    pub fn total_paragraphs(&self) -> usize {
        self.paragraph_starts.len()
    }

    pub fn total_pages(&self) -> usize {
        self.page_starts.len()
    }

    /// Page containing `word_index`: the greatest `k` with
    /// `page_starts[k] <= word_index`.
    pub fn page_of(&self, word_index: u32) -> u32 {
        match self.page_starts.binary_search(&word_index) {
            Ok(k) => k as u32,
            Err(k) => k.saturating_sub(1) as u32,
        }
    }

    /// Word range `[start, end)` of page `k`.
    pub fn page_range(&self, k: usize) -> (u32, u32) {
        let start = self.page_starts.get(k).copied().unwrap_or(0);
        let end = self
            .page_starts
            .get(k + 1)
            .copied()
            .unwrap_or(self.words.len() as u32);
        (start, end)
    }
}

/// A contiguous chunk of preview markup aligned to the word stream.
///
/// The markup wraps each word in a span carrying a `data-word-index`
/// attribute; that marker format is the contract the presentation layer's
/// click-to-navigate depends on and must stay identical across adapters.
/// Non-reading blocks (fenced code, horizontal rules) carry an empty range.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PreviewUnit {
    pub chapter: u32,
    pub markup: String,
    /// Half-open word range `[start, end)`. `start == end` signals a
    /// non-reading block that contributes no words.
    pub range: (u32, u32),
}

impl PreviewUnit {
    pub fn is_empty(&self) -> bool {
        self.range.1 == self.range.0
    }
}

/// One outline entry. Ordered by `start_word` ascending within a document.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ChapterEntry {
    pub title: String,
    /// Source anchor (spine href, heading slug, section id).
    pub anchor: String,
    pub start_word: u32,
}

/// Everything an adapter hands back on success.
///
/// Warnings are non-fatal; an empty-but-successful document is distinguished
/// from a parse failure by the adapter returning `Ok` at all.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ParseOutput {
    pub document: Document,
    pub title: Option<String>,
    pub author: Option<String>,
    pub chapters: Vec<ChapterEntry>,
    pub previews: Vec<PreviewUnit>,
    pub warnings: Vec<String>,
}

/// Incremental [`Document`] construction.
///
/// Paragraph and page breaks are recorded lazily: a break only materializes
/// when the next word arrives, so trailing or doubled breaks never produce
/// empty entries and the start arrays stay strictly increasing.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    words: Vec<Word>,
    paragraph_starts: Vec<u32>,
    page_starts: Vec<u32>,
    paragraph_pending: bool,
    page_pending: bool,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next word index to be assigned.
    pub fn next_index(&self) -> u32 {
        self.words.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of words on the page currently being filled.
    pub fn words_on_page(&self) -> usize {
        let start = self.page_starts.last().copied().unwrap_or(0) as usize;
        self.words.len() - start
    }

    /// Mark that the next word starts a new paragraph.
    pub fn break_paragraph(&mut self) {
        self.paragraph_pending = true;
    }

    /// Mark that the next word starts a new page (and paragraph).
    pub fn break_page(&mut self) {
        self.page_pending = true;
        self.paragraph_pending = true;
    }

    /// Append one word, stamping its paragraph and page indices. Returns the
    /// word's index in the stream.
    pub fn push_word(&mut self, text: impl Into<String>, style: Style) -> u32 {
        let index = self.words.len() as u32;
        if self.paragraph_starts.is_empty() || self.paragraph_pending {
            self.paragraph_starts.push(index);
            self.paragraph_pending = false;
        }
        if self.page_starts.is_empty() || self.page_pending {
            self.page_starts.push(index);
            self.page_pending = false;
        }
        self.words.push(Word {
            text: text.into(),
            paragraph: (self.paragraph_starts.len() - 1) as u32,
            page: (self.page_starts.len() - 1) as u32,
            italic: style.italic,
            bold: style.bold,
        });
        index
    }

    /// Texts of words in `[start, end)`. Used to derive heading titles.
    pub fn words_slice(&self, start: u32, end: u32) -> Vec<String> {
        let end = (end as usize).min(self.words.len());
        self.words[(start as usize).min(end)..end]
            .iter()
            .map(|w| w.text.clone())
            .collect()
    }

    /// Append an image placeholder (empty-text word).
    pub fn push_image_placeholder(&mut self) -> u32 {
        self.push_word(String::new(), Style::default())
    }

    pub fn finish(self) -> Document {
        Document {
            words: self.words,
            paragraph_starts: self.paragraph_starts,
            page_starts: self.page_starts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(b: &mut DocumentBuilder, text: &str) -> u32 {
        b.push_word(text, Style::default())
    }

    #[test]
    fn test_builder_stamps_indices() {
        let mut b = DocumentBuilder::new();
        word(&mut b, "one");
        word(&mut b, "two");
        b.break_paragraph();
        word(&mut b, "three");
        b.break_page();
        word(&mut b, "four");
        let doc = b.finish();

        assert_eq!(doc.total_words(), 4);
        assert_eq!(doc.paragraph_starts, vec![0, 2, 3]);
        assert_eq!(doc.page_starts, vec![0, 3]);
        assert_eq!(doc.words[2].paragraph, 1);
        assert_eq!(doc.words[3].page, 1);
    }

    #[test]
    fn test_redundant_breaks_collapse() {
        let mut b = DocumentBuilder::new();
        b.break_paragraph();
        b.break_page();
        b.break_paragraph();
        word(&mut b, "only");
        b.break_page();
        b.break_page();
        let doc = b.finish();

        assert_eq!(doc.paragraph_starts, vec![0]);
        assert_eq!(doc.page_starts, vec![0]);
        assert_eq!(doc.total_pages(), 1);
    }

    #[test]
    fn test_page_of_matches_greatest_start() {
        let mut b = DocumentBuilder::new();
        for i in 0..10 {
            if i == 4 || i == 7 {
                b.break_page();
            }
            word(&mut b, "w");
        }
        let doc = b.finish();
        assert_eq!(doc.page_starts, vec![0, 4, 7]);
        for (i, w) in doc.words.iter().enumerate() {
            assert_eq!(w.page, doc.page_of(i as u32));
        }
    }

    #[test]
    fn test_start_arrays_strictly_increasing() {
        let mut b = DocumentBuilder::new();
        for i in 0..25 {
            if i % 3 == 0 {
                b.break_paragraph();
            }
            if i % 10 == 0 {
                b.break_page();
            }
            word(&mut b, "x");
        }
        let doc = b.finish();
        assert!(doc.paragraph_starts.windows(2).all(|w| w[0] < w[1]));
        assert!(doc.page_starts.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(doc.page_starts[0], 0);
        assert_eq!(doc.paragraph_starts[0], 0);
    }
}
