//! FictionBook 2 (FB2) adapter.
//!
//! FB2 is a single XML file: `description` carries metadata, one or more
//! `body` elements carry content, and top-level `section`s within a body map
//! naturally onto chapters. Note bodies (`name="notes"`) hold footnote
//! targets and are skipped. Inline `emphasis`/`strong` thread the same
//! immutable style snapshot the HTML walker uses.

use crate::document::{ParseOutput, Style};
use crate::error::{Error, Result};
use crate::html::WalkContext;
use crate::options::ParseOptions;
use crate::registry::FormatAdapter;
use crate::tree::{self, Element, Node};
use crate::util::{decode_text, slugify};

pub struct Fb2Adapter;

impl FormatAdapter for Fb2Adapter {
    fn name(&self) -> &'static str {
        "FB2"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["fb2"]
    }

    fn media_types(&self) -> &'static [&'static str] {
        &["application/x-fictionbook+xml"]
    }

    fn parse(&self, input: &[u8], options: &ParseOptions) -> Result<ParseOutput> {
        let text = decode_text(input, None);
        let root = tree::parse_xml(&text)?;
        let book = root
            .find("fictionbook")
            .ok_or_else(|| Error::CorruptContainer("no FictionBook root element".into()))?;

        let mut ctx = WalkContext::new(options);
        read_metadata(book, &mut ctx);

        let mut chapter_number = 0usize;
        for body in book.children_named("body") {
            if matches!(body.attr("name"), Some("notes") | Some("comments")) {
                continue;
            }
            walk_body(body, &mut ctx, &mut chapter_number);
        }

        Ok(ctx.finish())
    }
}

fn read_metadata(book: &Element, ctx: &mut WalkContext) {
    let Some(title_info) = book
        .child("description")
        .and_then(|d| d.child("title-info"))
    else {
        return;
    };

    if let Some(title) = title_info.child("book-title") {
        let text = title.text_content();
        if !text.is_empty() {
            ctx.title = Some(text);
        }
    }
    if let Some(author) = title_info.child("author") {
        let name = ["first-name", "middle-name", "last-name"]
            .iter()
            .filter_map(|part| author.child(part))
            .map(|el| el.text_content())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !name.is_empty() {
            ctx.author = Some(name);
        }
    }
}

fn walk_body(body: &Element, ctx: &mut WalkContext, chapter_number: &mut usize) {
    for node in &body.children {
        let Node::Element(el) = node else { continue };
        if el.name == "section" {
            *chapter_number += 1;
            begin_section_chapter(el, ctx, *chapter_number);
            walk_section(el, ctx);
        } else {
            // Body-level front matter (title, epigraph) before any section.
            walk_block(el, Style::default(), ctx);
        }
    }
}

fn begin_section_chapter(section: &Element, ctx: &mut WalkContext, number: usize) {
    let title = section
        .child("title")
        .map(|t| t.text_content())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("Chapter {}", number));
    let anchor = section
        .attr("id")
        .map(|id| id.to_string())
        .unwrap_or_else(|| slugify(&title));
    ctx.begin_chapter(&title, &anchor);
}

/// Walk a section's blocks. Nested sections continue the current chapter;
/// only top-level sections open new ones.
fn walk_section(section: &Element, ctx: &mut WalkContext) {
    for node in &section.children {
        let Node::Element(el) = node else { continue };
        if el.name == "section" {
            walk_section(el, ctx);
        } else {
            walk_block(el, Style::default(), ctx);
        }
    }
}

fn walk_block(el: &Element, style: Style, ctx: &mut WalkContext) {
    match el.name.as_str() {
        "title" => walk_heading_block(el, "h2", style, ctx),
        "subtitle" => {
            ctx.maybe_break_page();
            ctx.ensure_unit();
            ctx.doc.break_paragraph();
            ctx.preview.open_tag("h3");
            walk_inline_children(el, style, ctx);
            ctx.preview.close_tag("h3");
            ctx.doc.break_paragraph();
        }
        "p" | "v" | "text-author" => {
            ctx.maybe_break_page();
            ctx.ensure_unit();
            ctx.doc.break_paragraph();
            ctx.preview.open_tag("p");
            walk_inline_children(el, style, ctx);
            ctx.preview.close_tag("p");
            ctx.doc.break_paragraph();
        }
        "epigraph" | "annotation" | "cite" => {
            ctx.preview.open_tag("blockquote");
            for node in &el.children {
                if let Node::Element(child) = node {
                    walk_block(child, style.italic(), ctx);
                }
            }
            ctx.preview.close_tag("blockquote");
        }
        "poem" | "stanza" => {
            for node in &el.children {
                if let Node::Element(child) = node {
                    walk_block(child, style, ctx);
                }
            }
        }
        "empty-line" => ctx.doc.break_paragraph(),
        "image" => {
            ctx.ensure_unit();
            ctx.emit_image(el);
        }
        _ => {
            for node in &el.children {
                if let Node::Element(child) = node {
                    walk_block(child, style, ctx);
                }
            }
        }
    }
}

/// Title blocks contain their own `p` lines; flatten them into one heading.
fn walk_heading_block(el: &Element, tag: &str, style: Style, ctx: &mut WalkContext) {
    ctx.ensure_unit();
    ctx.doc.break_paragraph();
    ctx.preview.open_tag(tag);
    for node in &el.children {
        match node {
            Node::Text(text) => ctx.emit_text(text, style),
            Node::Element(child) => walk_inline_children(child, style, ctx),
        }
    }
    ctx.preview.close_tag(tag);
    ctx.doc.break_paragraph();
}

fn walk_inline_children(el: &Element, style: Style, ctx: &mut WalkContext) {
    for node in &el.children {
        walk_inline(node, style, ctx);
    }
}

fn walk_inline(node: &Node, style: Style, ctx: &mut WalkContext) {
    let el = match node {
        Node::Text(text) => {
            ctx.emit_text(text, style);
            return;
        }
        Node::Element(el) => el,
    };
    match el.name.as_str() {
        "emphasis" => walk_inline_children(el, style.italic(), ctx),
        "strong" => walk_inline_children(el, style.bold(), ctx),
        "image" => ctx.emit_image(el),
        // a, style, sub, sup, strikethrough: text passes through unstyled.
        _ => walk_inline_children(el, style, ctx),
    }
}
