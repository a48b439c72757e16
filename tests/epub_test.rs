//! EPUB end-to-end tests.
//!
//! Packages are assembled in memory with the same zip writer the rest of the
//! suite uses, then fed through the registry so post-processing (page
//! merging, degenerate-result detection) runs too.

use std::io::{Cursor, Write};

use glance::{AdapterRegistry, ParseOptions, ParseOutput};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

struct EpubBuilder {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    chapters: Vec<String>,
}

impl EpubBuilder {
    fn new() -> Self {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("META-INF/container.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(
            br#"<container><rootfiles>
              <rootfile full-path="OEBPS/content.opf"/>
            </rootfiles></container>"#,
        )
        .unwrap();
        Self {
            zip,
            chapters: Vec::new(),
        }
    }

    fn chapter(mut self, title: &str, body: &str) -> Self {
        let i = self.chapters.len();
        self.zip
            .start_file(format!("OEBPS/ch{i}.xhtml"), SimpleFileOptions::default())
            .unwrap();
        self.zip
            .write_all(format!("<html><body>{body}</body></html>").as_bytes())
            .unwrap();
        self.chapters.push(title.to_string());
        self
    }

    fn finish(mut self, title: &str, author: &str) -> Vec<u8> {
        let opts = SimpleFileOptions::default();
        let mut manifest = String::new();
        let mut spine = String::new();
        let mut nav_points = String::new();
        for (i, chapter_title) in self.chapters.iter().enumerate() {
            manifest.push_str(&format!(
                r#"<item id="c{i}" href="ch{i}.xhtml" media-type="application/xhtml+xml"/>"#
            ));
            spine.push_str(&format!(r#"<itemref idref="c{i}"/>"#));
            nav_points.push_str(&format!(
                r#"<navPoint id="n{i}"><navLabel><text>{chapter_title}</text></navLabel><content src="ch{i}.xhtml"/></navPoint>"#
            ));
        }

        self.zip.start_file("OEBPS/content.opf", opts).unwrap();
        self.zip
            .write_all(
                format!(
                    r#"<package xmlns:dc="http://purl.org/dc/elements/1.1/">
                      <metadata><dc:title>{title}</dc:title><dc:creator>{author}</dc:creator></metadata>
                      <manifest>{manifest}<item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/></manifest>
                      <spine toc="ncx">{spine}</spine>
                    </package>"#
                )
                .as_bytes(),
            )
            .unwrap();

        self.zip.start_file("OEBPS/toc.ncx", opts).unwrap();
        self.zip
            .write_all(format!("<ncx><navMap>{nav_points}</navMap></ncx>").as_bytes())
            .unwrap();

        self.zip.finish().unwrap().into_inner()
    }
}

fn parse(data: &[u8]) -> ParseOutput {
    AdapterRegistry::with_defaults()
        .parse_bytes(data, Some("epub"), None, &ParseOptions::default())
        .unwrap()
}

// ============================================================================
// Structure
// ============================================================================

#[test]
fn test_metadata_and_outline() {
    let data = EpubBuilder::new()
        .chapter("One", "<p>first chapter text</p>")
        .chapter("Two", "<p>second chapter text</p>")
        .finish("The Book", "Someone");

    let out = parse(&data);
    assert_eq!(out.title.as_deref(), Some("The Book"));
    assert_eq!(out.author.as_deref(), Some("Someone"));
    assert_eq!(out.chapters.len(), 2);
    assert_eq!(out.chapters[0].title, "One");
    assert_eq!(out.chapters[1].start_word, 3);
    assert_eq!(out.document.total_words(), 6);
}

#[test]
fn test_short_chapters_keep_page_boundaries() {
    // Both chapters are far below the merge threshold, but a chapter start
    // must stay on a page boundary.
    let data = EpubBuilder::new()
        .chapter("A", "<p>tiny chapter</p>")
        .chapter("B", "<p>also tiny</p>")
        .finish("T", "A");

    let out = parse(&data);
    assert!(out.document.page_starts.contains(&out.chapters[1].start_word));
    assert_eq!(out.document.words[2].page, 1);
}

#[test]
fn test_formatting_inside_chapters() {
    let data = EpubBuilder::new()
        .chapter("C", "<p>plain <em>lean</em> <strong>heavy</strong></p>")
        .finish("T", "A");

    let out = parse(&data);
    let w = &out.document.words;
    assert!(!w[0].italic && !w[0].bold);
    assert!(w[1].italic);
    assert!(w[2].bold);
}

#[test]
fn test_preview_units_carry_chapter_index() {
    let data = EpubBuilder::new()
        .chapter("One", "<p>alpha</p>")
        .chapter("Two", "<p>beta</p>")
        .finish("T", "A");

    let out = parse(&data);
    assert_eq!(out.previews.first().unwrap().chapter, 0);
    assert_eq!(out.previews.last().unwrap().chapter, 1);
    let markup: String = out.previews.iter().map(|u| u.markup.as_str()).collect();
    assert!(markup.contains("data-word-index=\"0\">alpha"));
    assert!(markup.contains("data-word-index=\"1\">beta"));
}

// ============================================================================
// Degraded Inputs
// ============================================================================

#[test]
fn test_garbage_is_corrupt_container() {
    let err = AdapterRegistry::with_defaults()
        .parse_bytes(b"not a zip at all", Some("epub"), None, &ParseOptions::default())
        .unwrap_err();
    assert_eq!(err.category(), "corrupt-container");
}

#[test]
fn test_zip_without_container_xml_fails() {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("random.txt", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"hello").unwrap();
    let data = zip.finish().unwrap().into_inner();

    let err = AdapterRegistry::with_defaults()
        .parse_bytes(&data, Some("epub"), None, &ParseOptions::default())
        .unwrap_err();
    assert_eq!(err.category(), "corrupt-container");
}

#[test]
fn test_image_only_chapter_yields_placeholder() {
    let data = EpubBuilder::new()
        .chapter("Plates", r#"<p><img src="plate1.png"/></p>"#)
        .chapter("Text", "<p>readable words here</p>")
        .finish("T", "A");

    let out = parse(&data);
    assert!(out.document.words[0].is_image_placeholder());
    assert_eq!(out.document.total_words(), 4);
}
