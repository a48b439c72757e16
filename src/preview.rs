//! Preview markup generation.
//!
//! Adapters emit HTML-like preview markup alongside the word stream. Every
//! word is wrapped in `<span data-word-index="N">...</span>`; the marker
//! format is the stable contract click-to-navigate depends on, identical
//! across all adapters.

use crate::document::{PreviewUnit, Style};

/// Escape text for embedding in preview markup.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Write one word span into `markup`.
pub fn word_span(markup: &mut String, index: u32, text: &str) {
    markup.push_str(&format!(
        "<span data-word-index=\"{}\">{}</span>",
        index,
        escape(text)
    ));
}

/// Accumulates preview units for one document.
///
/// Tag-tree walkers open and close inline tags through this builder so the
/// markup nests the same way the source did; unit boundaries are only taken
/// at points where no inline tag is open.
#[derive(Debug, Default)]
pub struct PreviewBuilder {
    units: Vec<PreviewUnit>,
    chapter: u32,
    markup: String,
    unit_start: u32,
    open: bool,
}

impl PreviewBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a unit is currently accumulating markup.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Begin a new unit. Closes any unit in progress.
    pub fn open_unit(&mut self, chapter: u32, next_word: u32) {
        self.close_unit(next_word);
        self.chapter = chapter;
        self.unit_start = next_word;
        self.open = true;
    }

    /// Close the unit in progress, recording its word range as
    /// `[unit_start, next_word)`. Whitespace-only units are dropped.
    pub fn close_unit(&mut self, next_word: u32) {
        if !self.open {
            return;
        }
        let markup = std::mem::take(&mut self.markup);
        self.open = false;
        if markup.trim().is_empty() {
            return;
        }
        self.units.push(PreviewUnit {
            chapter: self.chapter,
            markup,
            range: (self.unit_start, next_word),
        });
    }

    /// Append an already-escaped markup fragment (tags, separators).
    pub fn raw(&mut self, fragment: &str) {
        self.markup.push_str(fragment);
    }

    pub fn open_tag(&mut self, name: &str) {
        self.markup.push('<');
        self.markup.push_str(name);
        self.markup.push('>');
    }

    pub fn close_tag(&mut self, name: &str) {
        self.markup.push_str("</");
        self.markup.push_str(name);
        self.markup.push('>');
    }

    /// Append one word span, wrapped in emphasis tags matching its style.
    pub fn word(&mut self, index: u32, text: &str, style: Style) {
        if style.italic {
            self.open_tag("em");
        }
        if style.bold {
            self.open_tag("strong");
        }
        word_span(&mut self.markup, index, text);
        if style.bold {
            self.close_tag("strong");
        }
        if style.italic {
            self.close_tag("em");
        }
    }

    /// Append a whole standalone unit (code block, horizontal rule) with an
    /// empty word range.
    pub fn empty_unit(&mut self, chapter: u32, markup: String, at_word: u32) {
        self.close_unit(at_word);
        self.units.push(PreviewUnit {
            chapter,
            markup,
            range: (at_word, at_word),
        });
    }

    pub fn finish(mut self, next_word: u32) -> Vec<PreviewUnit> {
        self.close_unit(next_word);
        self.units
    }
}
