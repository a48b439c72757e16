//! DOCX (Office Open XML) adapter.
//!
//! A DOCX is a zip package; the text lives in `word/document.xml` as a flat
//! list of paragraphs (`p`) containing runs (`r`), each run carrying its own
//! property block (`rPr`) and text elements (`t`). Namespace prefixes are
//! stripped during tree construction, so this walker matches bare local
//! names. Paragraphs styled Heading1/Heading2/Title become chapter
//! boundaries; metadata comes from `docProps/core.xml`.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::document::{ParseOutput, Style};
use crate::error::Result;
use crate::html::WalkContext;
use crate::options::ParseOptions;
use crate::registry::FormatAdapter;
use crate::tree::{self, Element, Node};
use crate::util::slugify;

pub struct DocxAdapter;

impl FormatAdapter for DocxAdapter {
    fn name(&self) -> &'static str {
        "DOCX"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["docx"]
    }

    fn media_types(&self) -> &'static [&'static str] {
        &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"]
    }

    fn parse(&self, input: &[u8], options: &ParseOptions) -> Result<ParseOutput> {
        let cursor = Cursor::new(input);
        let mut archive = ZipArchive::new(cursor)?;

        let mut ctx = WalkContext::new(options);
        if let Ok(core) = read_archive_string(&mut archive, "docProps/core.xml")
            && let Ok(root) = tree::parse_xml(&core)
        {
            read_core_properties(&root, &mut ctx);
        }

        let document = read_archive_string(&mut archive, "word/document.xml")?;
        let root = tree::parse_xml(&document)?;

        if let Some(body) = root.find("body") {
            let mut chapter_number = 0usize;
            for node in &body.children {
                if let Node::Element(el) = node {
                    walk_body_element(el, &mut ctx, &mut chapter_number);
                }
            }
        }

        Ok(ctx.finish())
    }
}

fn read_core_properties(root: &Element, ctx: &mut WalkContext) {
    if let Some(title) = root.find("title") {
        let text = title.text_content();
        if !text.is_empty() {
            ctx.title = Some(text);
        }
    }
    if let Some(creator) = root.find("creator") {
        let text = creator.text_content();
        if !text.is_empty() {
            ctx.author = Some(text);
        }
    }
}

fn walk_body_element(el: &Element, ctx: &mut WalkContext, chapter_number: &mut usize) {
    match el.name.as_str() {
        "p" => walk_paragraph(el, ctx, chapter_number),
        // Tables and section wrappers: recurse to the paragraphs inside.
        _ => {
            for node in &el.children {
                if let Node::Element(child) = node {
                    walk_body_element(child, ctx, chapter_number);
                }
            }
        }
    }
}

fn walk_paragraph(p: &Element, ctx: &mut WalkContext, chapter_number: &mut usize) {
    let heading = heading_level(p);

    if let Some(level) = heading {
        let text = p.text_content();
        if !text.is_empty() && level <= 2 {
            *chapter_number += 1;
            ctx.begin_chapter(&text, &slugify(&text));
            if ctx.title.is_none() && level == 1 {
                ctx.title = Some(text);
            }
        } else {
            ctx.maybe_break_page();
        }
    } else {
        ctx.maybe_break_page();
    }
    ctx.ensure_unit();
    ctx.doc.break_paragraph();

    let tag = match heading {
        Some(1) => "h1",
        Some(2) => "h2",
        Some(_) => "h3",
        None => "p",
    };
    ctx.preview.open_tag(tag);
    for node in &p.children {
        if let Node::Element(el) = node {
            walk_run_container(el, Style::default(), ctx);
        }
    }
    ctx.preview.close_tag(tag);
    ctx.doc.break_paragraph();
}

/// Heading level from the paragraph style: Title counts as level 1,
/// HeadingN as level N.
fn heading_level(p: &Element) -> Option<u8> {
    let style = p.child("ppr")?.child("pstyle")?.attr("val")?;
    if style.eq_ignore_ascii_case("title") {
        return Some(1);
    }
    let digits = style.strip_prefix("Heading").or_else(|| style.strip_prefix("heading"))?;
    digits.trim_start_matches(|c: char| !c.is_ascii_digit()).parse().ok()
}

fn walk_run_container(el: &Element, style: Style, ctx: &mut WalkContext) {
    match el.name.as_str() {
        "r" => walk_run(el, style, ctx),
        "ppr" => {}
        // hyperlink, smartTag, ins: transparent containers of runs.
        _ => {
            for node in &el.children {
                if let Node::Element(child) = node {
                    walk_run_container(child, style, ctx);
                }
            }
        }
    }
}

fn walk_run(run: &Element, base: Style, ctx: &mut WalkContext) {
    let style = run
        .child("rpr")
        .map(|rpr| run_style(rpr, base))
        .unwrap_or(base);

    for node in &run.children {
        let Node::Element(el) = node else { continue };
        match el.name.as_str() {
            "t" => {
                let mut text = String::new();
                for child in &el.children {
                    if let Node::Text(t) = child {
                        text.push_str(t);
                    }
                }
                ctx.emit_text(&text, style);
            }
            "tab" | "br" | "cr" => ctx.preview.raw(" "),
            "drawing" | "pict" => {
                ctx.ensure_unit();
                let index = ctx.doc.push_image_placeholder();
                ctx.preview.raw(&format!(
                    "<span data-word-index=\"{}\"><img/></span>",
                    index
                ));
            }
            _ => {}
        }
    }
}

/// Toggle properties: `<i/>` turns italic on unless `val` says off.
fn run_style(rpr: &Element, base: Style) -> Style {
    let on = |name: &str| {
        rpr.child(name).is_some_and(|el| {
            !matches!(el.attr("val"), Some("0") | Some("false") | Some("off"))
        })
    };
    Style {
        italic: base.italic || on("i"),
        bold: base.bold || on("b"),
    }
}

fn read_archive_string(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    path: &str,
) -> Result<String> {
    let mut file = archive.by_name(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn build_docx(document_xml: &str, core_xml: Option<&str>) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        zip.start_file("word/document.xml", opts).unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        if let Some(core) = core_xml {
            zip.start_file("docProps/core.xml", opts).unwrap();
            zip.write_all(core.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn parse(data: &[u8]) -> ParseOutput {
        DocxAdapter.parse(data, &ParseOptions::default()).unwrap()
    }

    #[test]
    fn test_runs_and_styles() {
        let data = build_docx(
            r#"<w:document xmlns:w="w"><w:body>
              <w:p>
                <w:r><w:t>plain </w:t></w:r>
                <w:r><w:rPr><w:i/></w:rPr><w:t>italic</w:t></w:r>
                <w:r><w:rPr><w:b/></w:rPr><w:t>bold</w:t></w:r>
              </w:p>
            </w:body></w:document>"#,
            None,
        );
        let out = parse(&data);
        let w = &out.document.words;
        assert_eq!(w.len(), 3);
        assert!(!w[0].italic && !w[0].bold);
        assert!(w[1].italic);
        assert!(w[2].bold);
    }

    #[test]
    fn test_toggle_val_off() {
        let data = build_docx(
            r#"<w:document xmlns:w="w"><w:body>
              <w:p><w:r><w:rPr><w:i w:val="0"/><w:b w:val="false"/></w:rPr><w:t>word</w:t></w:r></w:p>
            </w:body></w:document>"#,
            None,
        );
        let out = parse(&data);
        assert!(!out.document.words[0].italic);
        assert!(!out.document.words[0].bold);
    }

    #[test]
    fn test_headings_become_chapters() {
        let data = build_docx(
            r#"<w:document xmlns:w="w"><w:body>
              <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>First Chapter</w:t></w:r></w:p>
              <w:p><w:r><w:t>some body text</w:t></w:r></w:p>
              <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Second Chapter</w:t></w:r></w:p>
              <w:p><w:r><w:t>more text</w:t></w:r></w:p>
            </w:body></w:document>"#,
            None,
        );
        let out = parse(&data);
        assert_eq!(out.chapters.len(), 2);
        assert_eq!(out.chapters[0].title, "First Chapter");
        assert_eq!(out.chapters[1].start_word, 5);
        assert_eq!(out.document.words[5].page, 1);
    }

    #[test]
    fn test_core_properties() {
        let data = build_docx(
            r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>x</w:t></w:r></w:p></w:body></w:document>"#,
            Some(
                r#"<cp:coreProperties xmlns:cp="cp" xmlns:dc="dc">
                  <dc:title>Doc Title</dc:title><dc:creator>Writer Person</dc:creator>
                </cp:coreProperties>"#,
            ),
        );
        let out = parse(&data);
        assert_eq!(out.title.as_deref(), Some("Doc Title"));
        assert_eq!(out.author.as_deref(), Some("Writer Person"));
    }

    #[test]
    fn test_title_style_sets_title() {
        let data = build_docx(
            r#"<w:document xmlns:w="w"><w:body>
              <w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>The Document</w:t></w:r></w:p>
              <w:p><w:r><w:t>content</w:t></w:r></w:p>
            </w:body></w:document>"#,
            None,
        );
        let out = parse(&data);
        assert_eq!(out.title.as_deref(), Some("The Document"));
    }

    #[test]
    fn test_paragraphs_separate() {
        let data = build_docx(
            r#"<w:document xmlns:w="w"><w:body>
              <w:p><w:r><w:t>one two</w:t></w:r></w:p>
              <w:p><w:r><w:t>three</w:t></w:r></w:p>
            </w:body></w:document>"#,
            None,
        );
        let out = parse(&data);
        assert_eq!(out.document.total_paragraphs(), 2);
        assert_eq!(out.document.words[2].paragraph, 1);
    }

    #[test]
    fn test_not_a_zip_is_corrupt() {
        let err = DocxAdapter
            .parse(b"plain bytes", &ParseOptions::default())
            .unwrap_err();
        assert_eq!(err.category(), "corrupt-container");
    }

    #[test]
    fn test_drawing_becomes_placeholder() {
        let data = build_docx(
            r#"<w:document xmlns:w="w"><w:body>
              <w:p><w:r><w:t>before</w:t></w:r><w:r><w:drawing/></w:r><w:r><w:t>after</w:t></w:r></w:p>
            </w:body></w:document>"#,
            None,
        );
        let out = parse(&data);
        assert_eq!(out.document.total_words(), 3);
        assert!(out.document.words[1].is_image_placeholder());
    }
}
