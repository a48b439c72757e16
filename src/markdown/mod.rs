//! Markdown block-model parser and adapter.
//!
//! Two phases: a continuation pre-pass repairs paragraphs split by hard line
//! wraps ([`continuation`]), then a line-oriented state machine recognizes
//! blocks in priority order — fences, blanks, ATX headings, horizontal rules,
//! blockquotes, indented continuations, bold-prefixed items, lists, and
//! plain paragraph accumulation. Inline content goes through [`inline`].
//!
//! Blocks are typed text / code / rule and carry a word range; contiguous
//! text blocks are grouped into pages bounded by a target word count, never
//! splitting a block. Fenced code and horizontal rules are non-reading
//! content: they become standalone preview units with an empty word range.
//!
//! Plain text is valid Markdown, so this adapter also serves `.txt` input.

mod continuation;
mod inline;

pub use continuation::merge_continuations;

use crate::document::{ChapterEntry, DocumentBuilder, ParseOutput, PreviewUnit, Style};
use crate::error::Result;
use crate::options::ParseOptions;
use crate::pagination::set_page_starts;
use crate::preview::escape;
use crate::registry::FormatAdapter;
use crate::util::{decode_text, slugify};
use inline::render_inline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Text,
    Code,
    Rule,
}

#[derive(Debug)]
struct Block {
    kind: BlockKind,
    markup: String,
    /// Half-open word range.
    start: u32,
    end: u32,
    /// Set for ATX headings; level 1-2 headings open chapters and pages.
    heading_level: Option<u8>,
    chapter: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

#[derive(Debug, Default)]
struct Parser {
    doc: DocumentBuilder,
    blocks: Vec<Block>,
    title: Option<String>,
    chapters: Vec<ChapterEntry>,
    paragraph: String,
    quote: String,
    list: Option<(ListKind, Vec<String>)>,
    fence: Option<(String, Vec<String>)>,
}

impl Parser {
    fn current_chapter(&self) -> u32 {
        self.chapters.len().saturating_sub(1) as u32
    }

    fn feed(&mut self, line: &str) {
        // Inside a fence everything is verbatim until the closing marker.
        if let Some((marker, lines)) = &mut self.fence {
            if line.trim_start().starts_with(marker.as_str()) {
                let (_, lines) = self.fence.take().expect("fence open");
                self.flush_code(lines);
            } else {
                lines.push(line.to_string());
            }
            return;
        }

        let trimmed = line.trim_start();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            self.flush_all();
            let marker = if trimmed.starts_with("```") { "```" } else { "~~~" };
            self.fence = Some((marker.to_string(), Vec::new()));
            return;
        }

        if trimmed.is_empty() {
            self.flush_all();
            return;
        }

        if let Some((level, text)) = parse_atx_heading(trimmed) {
            self.flush_all();
            self.heading(level, text);
            return;
        }

        if is_horizontal_rule(trimmed) {
            self.flush_all();
            self.blocks.push(Block {
                kind: BlockKind::Rule,
                markup: "<hr/>".to_string(),
                start: self.doc.next_index(),
                end: self.doc.next_index(),
                heading_level: None,
                chapter: self.current_chapter(),
            });
            return;
        }

        if let Some(rest) = trimmed.strip_prefix('>') {
            self.flush_paragraph();
            self.flush_list();
            if !self.quote.is_empty() {
                self.quote.push(' ');
            }
            self.quote.push_str(rest.strip_prefix(' ').unwrap_or(rest));
            return;
        }

        // Indented continuation: append to the active list item or paragraph.
        if line.starts_with("    ") || line.starts_with('\t') {
            if let Some((_, items)) = &mut self.list
                && let Some(last) = items.last_mut()
            {
                last.push(' ');
                last.push_str(trimmed);
                return;
            }
            if !self.paragraph.is_empty() {
                self.paragraph.push(' ');
                self.paragraph.push_str(trimmed);
                return;
            }
        }

        // Bold-prefixed list-item convention: "**Term** — description".
        if trimmed.starts_with("**") && !trimmed.starts_with("***") {
            self.push_list_item(ListKind::Unordered, trimmed);
            return;
        }

        if let Some(rest) = strip_bullet(trimmed) {
            self.push_list_item(ListKind::Unordered, rest);
            return;
        }
        if let Some(rest) = strip_ordered_marker(trimmed) {
            self.push_list_item(ListKind::Ordered, rest);
            return;
        }

        self.flush_quote();
        self.flush_list();
        if !self.paragraph.is_empty() {
            self.paragraph.push(' ');
        }
        self.paragraph.push_str(trimmed);
    }

    fn heading(&mut self, level: u8, text: &str) {
        // The first level-1 heading is the document title, consumed rather
        // than emitted.
        if level == 1 && self.title.is_none() && self.doc.is_empty() && self.blocks.is_empty() {
            let mut scratch = DocumentBuilder::new();
            let mut plain = String::new();
            render_inline(text, Style::default(), &mut scratch, &mut plain);
            let title: Vec<String> =
                scratch.finish().words.into_iter().map(|w| w.text).collect();
            self.title = Some(title.join(" "));
            return;
        }

        let start = self.doc.next_index();
        self.doc.break_paragraph();
        let mut markup = format!("<h{level}>");
        render_inline(text, Style::default(), &mut self.doc, &mut markup);
        trim_markup(&mut markup);
        markup.push_str(&format!("</h{level}>"));
        let end = self.doc.next_index();

        if level <= 2 && end > start {
            let title = self.doc.words_slice(start, end).join(" ");
            if level == 1 && self.title.is_none() {
                self.title = Some(title.clone());
            }
            self.chapters.push(ChapterEntry {
                anchor: format!("#{}", slugify(&title)),
                title,
                start_word: start,
            });
        }

        self.blocks.push(Block {
            kind: BlockKind::Text,
            markup,
            start,
            end,
            heading_level: Some(level),
            chapter: self.current_chapter(),
        });
    }

    fn push_list_item(&mut self, kind: ListKind, content: &str) {
        self.flush_paragraph();
        self.flush_quote();
        // Switching list type flushes the previous list.
        if let Some((current, _)) = &self.list
            && *current != kind
        {
            self.flush_list();
        }
        match &mut self.list {
            Some((_, items)) => items.push(content.to_string()),
            None => self.list = Some((kind, vec![content.to_string()])),
        }
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.paragraph);
        let start = self.doc.next_index();
        self.doc.break_paragraph();
        let mut markup = "<p>".to_string();
        render_inline(&text, Style::default(), &mut self.doc, &mut markup);
        trim_markup(&mut markup);
        markup.push_str("</p>");
        let end = self.doc.next_index();
        if end == start {
            return;
        }
        self.blocks.push(Block {
            kind: BlockKind::Text,
            markup,
            start,
            end,
            heading_level: None,
            chapter: self.current_chapter(),
        });
    }

    fn flush_quote(&mut self) {
        if self.quote.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.quote);
        let start = self.doc.next_index();
        self.doc.break_paragraph();
        let mut markup = "<blockquote><p>".to_string();
        render_inline(&text, Style::default(), &mut self.doc, &mut markup);
        trim_markup(&mut markup);
        markup.push_str("</p></blockquote>");
        let end = self.doc.next_index();
        self.blocks.push(Block {
            kind: BlockKind::Text,
            markup,
            start,
            end,
            heading_level: None,
            chapter: self.current_chapter(),
        });
    }

    fn flush_list(&mut self) {
        let Some((kind, items)) = self.list.take() else {
            return;
        };
        let tag = match kind {
            ListKind::Unordered => "ul",
            ListKind::Ordered => "ol",
        };
        let start = self.doc.next_index();
        let mut markup = format!("<{tag}>");
        for item in items {
            self.doc.break_paragraph();
            markup.push_str("<li>");
            render_inline(&item, Style::default(), &mut self.doc, &mut markup);
            trim_markup(&mut markup);
            markup.push_str("</li>");
        }
        markup.push_str(&format!("</{tag}>"));
        let end = self.doc.next_index();
        self.blocks.push(Block {
            kind: BlockKind::Text,
            markup,
            start,
            end,
            heading_level: None,
            chapter: self.current_chapter(),
        });
    }

    fn flush_code(&mut self, lines: Vec<String>) {
        let at = self.doc.next_index();
        let mut markup = "<pre><code>".to_string();
        markup.push_str(&escape(&lines.join("\n")));
        markup.push_str("</code></pre>");
        self.blocks.push(Block {
            kind: BlockKind::Code,
            markup,
            start: at,
            end: at,
            heading_level: None,
            chapter: self.current_chapter(),
        });
    }

    fn flush_all(&mut self) {
        self.flush_paragraph();
        self.flush_quote();
        self.flush_list();
    }

    fn finish(mut self, options: &ParseOptions) -> ParseOutput {
        if let Some((_, lines)) = self.fence.take() {
            self.flush_code(lines);
        }
        self.flush_all();

        let mut document = self.doc.finish();
        let target = options.page_target_words.max(1);

        // Group blocks into pages: threshold at block boundaries, hard break
        // at chapter-opening headings, never splitting a block.
        let mut page_starts: Vec<u32> = Vec::new();
        let mut words_on_page = 0usize;
        for block in &self.blocks {
            let block_words = (block.end - block.start) as usize;
            if block_words == 0 {
                continue;
            }
            let structural =
                block.heading_level.is_some_and(|l| l <= 2) && !page_starts.is_empty();
            if page_starts.is_empty() || words_on_page >= target || structural {
                page_starts.push(block.start);
                words_on_page = 0;
            }
            words_on_page += block_words;
        }
        if page_starts.is_empty() && !document.words.is_empty() {
            page_starts.push(0);
        }
        if !document.words.is_empty() {
            set_page_starts(&mut document, page_starts);
        }

        // One preview unit per run of text blocks on the same page;
        // code/rule blocks stand alone with empty ranges.
        let mut previews: Vec<PreviewUnit> = Vec::new();
        let mut unit: Option<PreviewUnit> = None;
        for block in &self.blocks {
            if block.kind != BlockKind::Text {
                if let Some(u) = unit.take() {
                    previews.push(u);
                }
                previews.push(PreviewUnit {
                    chapter: block.chapter,
                    markup: block.markup.clone(),
                    range: (block.start, block.end),
                });
                continue;
            }
            let page_break = unit.as_ref().is_some_and(|u| {
                document.page_of(u.range.0) != document.page_of(block.start)
            });
            match &mut unit {
                Some(u) if !page_break && u.chapter == block.chapter => {
                    u.markup.push_str(&block.markup);
                    u.range.1 = block.end;
                }
                _ => {
                    if let Some(u) = unit.take() {
                        previews.push(u);
                    }
                    unit = Some(PreviewUnit {
                        chapter: block.chapter,
                        markup: block.markup.clone(),
                        range: (block.start, block.end),
                    });
                }
            }
        }
        if let Some(u) = unit.take() {
            previews.push(u);
        }

        ParseOutput {
            document,
            title: self.title,
            author: None,
            chapters: self.chapters,
            previews,
            warnings: Vec::new(),
        }
    }
}

fn parse_atx_heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((hashes as u8, rest.trim().trim_end_matches('#').trim_end()))
}

fn is_horizontal_rule(line: &str) -> bool {
    let solid: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    solid.len() >= 3
        && (solid.chars().all(|c| c == '-')
            || solid.chars().all(|c| c == '*')
            || solid.chars().all(|c| c == '_'))
}

fn strip_bullet(line: &str) -> Option<&str> {
    for marker in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest.trim_start());
        }
    }
    None
}

fn strip_ordered_marker(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    rest.strip_prefix(". ")
        .or_else(|| rest.strip_prefix(") "))
        .map(|r| r.trim_start())
}

/// Drop the trailing separator space the inline renderer leaves behind.
fn trim_markup(markup: &mut String) {
    while markup.ends_with(' ') {
        markup.pop();
    }
}

pub struct MarkdownAdapter;

impl FormatAdapter for MarkdownAdapter {
    fn name(&self) -> &'static str {
        "Markdown"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["md", "markdown", "mdown", "txt", "text"]
    }

    fn media_types(&self) -> &'static [&'static str] {
        &["text/markdown", "text/plain"]
    }

    fn parse(&self, input: &[u8], options: &ParseOptions) -> Result<ParseOutput> {
        let source = decode_text(input, None);
        let repaired;
        let text: &str = if options.merge_continuations {
            repaired = merge_continuations(&source);
            &repaired
        } else {
            &source
        };

        let mut parser = Parser::default();
        for line in text.lines() {
            parser.feed(line);
        }
        Ok(parser.finish(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(md: &str) -> ParseOutput {
        MarkdownAdapter
            .parse(md.as_bytes(), &ParseOptions::default())
            .unwrap()
    }

    fn texts(out: &ParseOutput) -> Vec<&str> {
        out.document.words.iter().map(|w| w.text.as_str()).collect()
    }

    #[test]
    fn test_title_and_preview_markers() {
        let out = parse("# Title\n\nHello world.");
        assert_eq!(out.title.as_deref(), Some("Title"));
        assert_eq!(out.document.total_words(), 2);
        assert_eq!(out.previews.len(), 1);
        let markup = &out.previews[0].markup;
        assert!(markup.contains("data-word-index=\"0\">Hello"));
        assert!(markup.contains("data-word-index=\"1\">world."));
    }

    #[test]
    fn test_emphasis_words() {
        let out = parse("**bold** and *italic*");
        let w = &out.document.words;
        assert_eq!(texts(&out), ["bold", "and", "italic"]);
        assert!(w[0].bold && !w[0].italic);
        assert!(!w[1].bold && !w[1].italic);
        assert!(w[2].italic && !w[2].bold);
    }

    #[test]
    fn test_second_h1_is_block_not_title() {
        let out = parse("# First\n\ntext\n\n# Second\n\nmore");
        assert_eq!(out.title.as_deref(), Some("First"));
        assert_eq!(texts(&out), ["text", "Second", "more"]);
        assert_eq!(out.chapters.len(), 1);
        assert_eq!(out.chapters[0].title, "Second");
    }

    #[test]
    fn test_fenced_code_is_non_reading() {
        let out = parse("before\n\n```rust\nlet x = 1;\n```\n\nafter");
        assert_eq!(texts(&out), ["before", "after"]);
        let code_unit = out.previews.iter().find(|u| u.is_empty()).unwrap();
        assert!(code_unit.markup.contains("let x = 1;"));
        assert!(code_unit.markup.starts_with("<pre><code>"));
    }

    #[test]
    fn test_horizontal_rule_unit() {
        let out = parse("one\n\n---\n\ntwo");
        assert_eq!(texts(&out), ["one", "two"]);
        let rule = out.previews.iter().find(|u| u.markup == "<hr/>").unwrap();
        assert!(rule.is_empty());
        assert_eq!(rule.range.0, 1);
    }

    #[test]
    fn test_lists_and_type_switch() {
        let out = parse("- alpha\n- beta\n1. one\n2. two");
        assert_eq!(texts(&out), ["alpha", "beta", "one", "two"]);
        // Each item is its own paragraph.
        assert_eq!(out.document.total_paragraphs(), 4);
        let uls: Vec<_> = out
            .previews
            .iter()
            .filter(|u| u.markup.contains("<ul>"))
            .collect();
        assert!(!uls.is_empty());
        assert!(out.previews.iter().any(|u| u.markup.contains("<ol>")));
    }

    #[test]
    fn test_bold_prefixed_list_item() {
        let out = parse("**Speed**: how fast it goes\n**Size**: how big it is");
        assert_eq!(out.document.total_paragraphs(), 2);
        assert!(out.document.words[0].bold);
        assert!(out.previews[0].markup.contains("<li>"));
    }

    #[test]
    fn test_blockquote() {
        let out = parse("> quoted words here");
        assert_eq!(texts(&out), ["quoted", "words", "here"]);
        assert!(out.previews[0].markup.starts_with("<blockquote>"));
    }

    #[test]
    fn test_indented_continuation_joins_list_item() {
        let out = parse("- first item\n    continues here\n- second");
        assert_eq!(out.document.total_paragraphs(), 2);
        assert_eq!(
            texts(&out),
            ["first", "item", "continues", "here", "second"]
        );
    }

    #[test]
    fn test_continuation_merge_applies() {
        let out = parse("broken in\n\nthe middle.");
        assert_eq!(out.document.total_paragraphs(), 1);
    }

    #[test]
    fn test_continuation_merge_can_be_disabled() {
        let options = ParseOptions {
            merge_continuations: false,
            ..Default::default()
        };
        let out = MarkdownAdapter
            .parse(b"broken in\n\nthe middle.", &options)
            .unwrap();
        assert_eq!(out.document.total_paragraphs(), 2);
    }

    #[test]
    fn test_heading_title_not_in_word_stream() {
        let out = parse("# Only Title");
        assert_eq!(out.document.total_words(), 0);
        assert_eq!(out.title.as_deref(), Some("Only Title"));
    }

    #[test]
    fn test_pages_group_blocks() {
        let mut source = String::new();
        for i in 0..120 {
            source.push_str(&format!("word{i} word word word word\n\n"));
        }
        let options = ParseOptions {
            page_target_words: 100,
            merge_continuations: false,
            ..Default::default()
        };
        let out = MarkdownAdapter.parse(source.as_bytes(), &options).unwrap();
        assert!(out.document.total_pages() > 1);
        // Page boundaries sit on block boundaries: every page start is a
        // paragraph start.
        for &start in &out.document.page_starts {
            assert!(out.document.paragraph_starts.contains(&start));
        }
    }
}
