//! HTML/XHTML tag-tree walker and adapter.
//!
//! This walker is the shared engine for every HTML-shaped input: standalone
//! HTML files, EPUB chapter bodies, and MOBI text payloads. It descends the
//! parsed tag tree threading an immutable formatting snapshot, emits one word
//! per non-whitespace token in document order, mirrors each word into preview
//! markup, and breaks paragraphs at block boundaries. Pages break on a word
//! count threshold at top-level block boundaries, or unconditionally when a
//! chapter begins.

use crate::document::{ChapterEntry, DocumentBuilder, ParseOutput, Style};
use crate::error::Result;
use crate::options::ParseOptions;
use crate::preview::{PreviewBuilder, escape};
use crate::registry::FormatAdapter;
use crate::tree::{self, Element, Node};
use crate::util::decode_text;
use crate::words::tokenize;

/// Walker state threaded through one document's traversal.
pub(crate) struct WalkContext {
    pub doc: DocumentBuilder,
    pub preview: PreviewBuilder,
    pub chapters: Vec<ChapterEntry>,
    pub warnings: Vec<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    target_words: usize,
    chapter: u32,
    block_depth: usize,
    /// Whether any chapter boundary was declared explicitly (EPUB spine);
    /// suppresses the heading-based chapter heuristic.
    explicit_chapters: bool,
}

impl WalkContext {
    pub fn new(options: &ParseOptions) -> Self {
        Self {
            doc: DocumentBuilder::new(),
            preview: PreviewBuilder::new(),
            chapters: Vec::new(),
            warnings: Vec::new(),
            title: None,
            author: None,
            target_words: options.page_target_words.max(1),
            chapter: 0,
            block_depth: 0,
            explicit_chapters: false,
        }
    }

    /// Begin a chapter at the current stream position: hard page boundary,
    /// outline entry, fresh preview unit.
    pub fn begin_chapter(&mut self, title: &str, anchor: &str) {
        if !self.chapters.is_empty() || !self.doc.is_empty() {
            self.chapter = self.chapters.len() as u32;
        }
        self.explicit_chapters = true;
        self.doc.break_page();
        self.chapters.push(ChapterEntry {
            title: title.to_string(),
            anchor: anchor.to_string(),
            start_word: self.doc.next_index(),
        });
        self.preview.open_unit(self.chapter, self.doc.next_index());
    }

    /// Open a preview unit at the current stream position if none is in
    /// progress. Safe to call repeatedly within a unit.
    pub(crate) fn ensure_unit(&mut self) {
        if !self.preview.is_open() {
            self.preview.open_unit(self.chapter, self.doc.next_index());
        }
    }

    /// Word-count page break, taken only between top-level blocks so preview
    /// units never split an open tag.
    pub(crate) fn maybe_break_page(&mut self) {
        if self.block_depth == 0 && self.doc.words_on_page() >= self.target_words {
            self.doc.break_page();
            self.preview.open_unit(self.chapter, self.doc.next_index());
        }
    }

    pub(crate) fn emit_text(&mut self, text: &str, style: Style) {
        let doc = &mut self.doc;
        let preview = &mut self.preview;
        tokenize(text, |word| {
            let index = doc.push_word(word, style);
            preview.word(index, word, style);
            preview.raw(" ");
        });
    }

    pub(crate) fn emit_image(&mut self, el: &Element) {
        let index = self.doc.push_image_placeholder();
        let src = el.attr("src").or_else(|| el.attr("href")).unwrap_or("");
        self.preview.raw(&format!(
            "<span data-word-index=\"{}\"><img src=\"{}\"/></span>",
            index,
            escape(src)
        ));
    }

    pub fn finish(mut self) -> ParseOutput {
        let document = self.doc.finish();
        let previews = self.preview.finish(document.total_words() as u32);
        ParseOutput {
            document,
            title: self.title.take(),
            author: self.author.take(),
            chapters: self.chapters,
            previews,
            warnings: self.warnings,
        }
    }
}

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "dl", "dt", "dd", "blockquote", "pre",
    "table", "tr", "td", "th", "section", "article", "aside", "figure",
    "figcaption", "center", "caption",
];

/// Tags rendered into the preview as themselves. Everything else
/// block-shaped falls back to `<p>`.
const PRESERVED_TAGS: &[&str] = &[
    "p", "li", "ul", "ol", "blockquote", "pre", "h1", "h2", "h3", "h4", "h5", "h6",
];

fn preview_tag(name: &str) -> Option<&'static str> {
    PRESERVED_TAGS.iter().copied().find(|t| *t == name)
}

/// Walk an element's children in document order.
pub(crate) fn walk_children(el: &Element, style: Style, ctx: &mut WalkContext) {
    for node in &el.children {
        walk(node, style, ctx);
    }
}

fn walk(node: &Node, style: Style, ctx: &mut WalkContext) {
    let el = match node {
        Node::Text(text) => {
            ctx.ensure_unit();
            ctx.emit_text(text, style);
            return;
        }
        Node::Element(el) => el,
    };

    match el.name.as_str() {
        "script" | "style" | "template" | "head" | "nav" => {}
        "br" => ctx.preview.raw("<br/>"),
        "img" | "image" => {
            ctx.ensure_unit();
            ctx.emit_image(el);
        }
        "hr" => {
            if ctx.block_depth == 0 && !ctx.doc.is_empty() {
                let at = ctx.doc.next_index();
                let chapter = ctx.chapter;
                ctx.preview.empty_unit(chapter, "<hr/>".to_string(), at);
                ctx.preview.open_unit(chapter, at);
                ctx.doc.break_paragraph();
            }
        }
        "em" | "i" | "cite" | "dfn" | "var" => walk_children(el, style.italic(), ctx),
        "strong" | "b" => walk_children(el, style.bold(), ctx),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => walk_heading(el, style, ctx),
        name if BLOCK_TAGS.contains(&name) => walk_block(el, name, style, ctx),
        _ => walk_children(el, style, ctx),
    }
}

fn walk_block(el: &Element, name: &str, style: Style, ctx: &mut WalkContext) {
    if ctx.block_depth == 0 {
        ctx.maybe_break_page();
    }
    ctx.ensure_unit();
    ctx.doc.break_paragraph();

    let tag = preview_tag(name);
    let wrap = tag.unwrap_or("p");
    // Pure containers (div, section, table) pass through without their own
    // preview tag; their block children wrap themselves.
    let transparent = tag.is_none() && has_block_children(el);

    if !transparent {
        ctx.preview.open_tag(wrap);
    }
    ctx.block_depth += 1;
    walk_children(el, style, ctx);
    ctx.block_depth -= 1;
    if !transparent {
        ctx.preview.close_tag(wrap);
    }
    ctx.doc.break_paragraph();
}

fn walk_heading(el: &Element, style: Style, ctx: &mut WalkContext) {
    let level = el.name.as_bytes()[1] - b'0';
    let text = el.text_content();

    if ctx.title.is_none() && level == 1 && !text.is_empty() {
        ctx.title = Some(text.clone());
    }

    // Top-level h1/h2 are structural boundaries: new page, and a chapter
    // entry unless the container format already declared chapters.
    if ctx.block_depth == 0 && level <= 2 && !text.is_empty() {
        if ctx.explicit_chapters {
            ctx.maybe_break_page();
        } else if ctx.doc.is_empty() && ctx.chapters.is_empty() {
            ctx.ensure_unit();
            ctx.chapters.push(ChapterEntry {
                title: text.clone(),
                anchor: format!("#{}", crate::util::slugify(&text)),
                start_word: 0,
            });
        } else {
            ctx.chapter = ctx.chapters.len() as u32;
            ctx.doc.break_page();
            ctx.chapters.push(ChapterEntry {
                title: text.clone(),
                anchor: format!("#{}", crate::util::slugify(&text)),
                start_word: ctx.doc.next_index(),
            });
            ctx.preview.open_unit(ctx.chapter, ctx.doc.next_index());
        }
    } else if ctx.block_depth == 0 {
        ctx.maybe_break_page();
    }

    ctx.ensure_unit();
    ctx.doc.break_paragraph();
    let tag = format!("h{}", level.min(6));
    ctx.preview.open_tag(&tag);
    ctx.block_depth += 1;
    walk_children(el, style, ctx);
    ctx.block_depth -= 1;
    ctx.preview.close_tag(&tag);
    ctx.doc.break_paragraph();
}

fn has_block_children(el: &Element) -> bool {
    el.children.iter().any(|n| match n {
        Node::Element(e) => {
            BLOCK_TAGS.contains(&e.name.as_str()) || e.name.starts_with('h') && e.name.len() == 2
        }
        _ => false,
    })
}

/// Walk a full HTML document: capture `<title>`, then walk the body.
pub(crate) fn walk_document(root: &Element, ctx: &mut WalkContext) {
    if ctx.title.is_none()
        && let Some(title_el) = root.find("title")
    {
        let text = title_el.text_content();
        if !text.is_empty() {
            ctx.title = Some(text);
        }
    }
    let body = root.find("body");
    match body {
        Some(body) => walk_children(body, Style::default(), ctx),
        None => {
            // Fragment without a body wrapper.
            for node in &root.children {
                walk(node, Style::default(), ctx);
            }
        }
    }
}

/// Adapter for standalone HTML/XHTML files.
pub struct HtmlAdapter;

impl FormatAdapter for HtmlAdapter {
    fn name(&self) -> &'static str {
        "HTML"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["html", "htm", "xhtml"]
    }

    fn media_types(&self) -> &'static [&'static str] {
        &["text/html", "application/xhtml+xml"]
    }

    fn parse(&self, input: &[u8], options: &ParseOptions) -> Result<ParseOutput> {
        let text = decode_text(input, None);
        let root = tree::parse_html(&text)?;
        let mut ctx = WalkContext::new(options);
        walk_document(&root, &mut ctx);
        Ok(ctx.finish())
    }
}
