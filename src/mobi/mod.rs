//! PalmDoc/MOBI ebook adapter.
//!
//! The container is a Palm Database: record 0 carries the PalmDoc header
//! (compression scheme, text length, text record count, encryption flag);
//! records 1..=count carry the compressed text. MOBI files additionally
//! declare a codepage and an exact title inside the extended record 0
//! header. Decompressed MOBI text is HTML and goes through the tag-tree
//! walker; bare PalmDoc text is split into paragraphs on blank lines.

pub mod palmdoc;
pub mod pdb;

use crate::document::{ParseOutput, Style};
use crate::error::{Error, Result};
use crate::html::{WalkContext, walk_document};
use crate::options::ParseOptions;
use crate::preview::PreviewBuilder;
use crate::registry::FormatAdapter;
use crate::tree;
use crate::util::decode_text;
use crate::words::tokenize;
use pdb::PdbFile;

const COMPRESSION_NONE: u16 = 1;
const COMPRESSION_PALMDOC: u16 = 2;
const COMPRESSION_HUFF_CDIC: u16 = 0x4448; // "DH"

/// PalmDoc header fields from record 0.
#[derive(Debug)]
struct PalmDocHeader {
    compression: u16,
    text_length: u32,
    text_record_count: u16,
    encryption: u16,
    /// MOBI codepage (1252 or 65001); `None` for bare PalmDoc.
    codepage: Option<u32>,
    /// Full title from the MOBI header, when present.
    title: Option<String>,
}

impl PalmDocHeader {
    fn parse(record: &[u8]) -> Result<Self> {
        if record.len() < 14 {
            return Err(Error::CorruptContainer("PalmDoc header too short".into()));
        }
        let compression = u16::from_be_bytes([record[0], record[1]]);
        let text_length = u32::from_be_bytes([record[4], record[5], record[6], record[7]]);
        let text_record_count = u16::from_be_bytes([record[8], record[9]]);
        let encryption = u16::from_be_bytes([record[12], record[13]]);

        // The MOBI extension follows at offset 16: "MOBI" magic, header
        // length, type, codepage, then (at 0x54) title offset/length.
        let mut codepage = None;
        let mut title = None;
        if record.len() >= 32 && &record[16..20] == b"MOBI" {
            codepage = Some(u32::from_be_bytes([
                record[28], record[29], record[30], record[31],
            ]));
            if record.len() >= 0x5C {
                let offset = u32::from_be_bytes([
                    record[0x54], record[0x55], record[0x56], record[0x57],
                ]) as usize;
                let length = u32::from_be_bytes([
                    record[0x58], record[0x59], record[0x5A], record[0x5B],
                ]) as usize;
                if length > 0 && offset.checked_add(length).is_some_and(|end| end <= record.len()) {
                    title = Some(
                        String::from_utf8_lossy(&record[offset..offset + length]).into_owned(),
                    );
                }
            }
        }

        Ok(Self {
            compression,
            text_length,
            text_record_count,
            encryption,
            codepage,
            title,
        })
    }
}

pub struct MobiAdapter;

impl FormatAdapter for MobiAdapter {
    fn name(&self) -> &'static str {
        "MOBI"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pdb", "prc", "mobi", "azw"]
    }

    fn media_types(&self) -> &'static [&'static str] {
        &["application/x-mobipocket-ebook"]
    }

    fn parse(&self, input: &[u8], options: &ParseOptions) -> Result<ParseOutput> {
        let container = PdbFile::parse(input)?;
        if !container.is_palmdoc() && !container.is_mobi() {
            return Err(Error::UnsupportedFormat(format!(
                "not a PalmDoc or MOBI database (type/creator {:?})",
                String::from_utf8_lossy(&container.type_creator)
            )));
        }

        let header = PalmDocHeader::parse(
            container
                .record(0)
                .ok_or_else(|| Error::CorruptContainer("missing record 0".into()))?,
        )?;

        if header.encryption != 0 {
            return Err(Error::EncryptedContent(
                "this book is DRM-protected and cannot be read".into(),
            ));
        }

        let mut warnings = Vec::new();
        let mut text_bytes: Vec<u8> = Vec::with_capacity(header.text_length as usize);
        let record_count = (header.text_record_count as usize).min(container.record_count() - 1);
        if record_count < header.text_record_count as usize {
            warnings.push(format!(
                "text record count {} exceeds records present; reading {}",
                header.text_record_count, record_count
            ));
        }

        for k in 1..=record_count {
            let record = container.record(k).unwrap_or(&[]);
            match header.compression {
                COMPRESSION_NONE => text_bytes.extend_from_slice(record),
                COMPRESSION_PALMDOC => {
                    match palmdoc::decompress(record, options.strictness) {
                        Ok(decoded) => text_bytes.extend_from_slice(&decoded),
                        // One bad record loses that record, not the book.
                        Err(e) => {
                            log::warn!("text record {k} failed to decompress: {e}");
                            warnings.push(format!("text record {k} is corrupt and was skipped"));
                        }
                    }
                }
                COMPRESSION_HUFF_CDIC => {
                    return Err(Error::UnsupportedCompression(
                        "HUFF/CDIC compression is not supported; re-export the book as \
                         uncompressed MOBI or EPUB"
                            .into(),
                    ));
                }
                n => {
                    return Err(Error::UnsupportedCompression(format!(
                        "unknown compression scheme {n}"
                    )));
                }
            }
        }

        text_bytes.truncate(header.text_length as usize);

        let hint = match header.codepage {
            Some(65001) => Some("utf-8"),
            Some(1252) | None => Some("windows-1252"),
            Some(_) => None,
        };
        let text = decode_text(&text_bytes, hint);

        let title = header
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| Some(container.name.clone()).filter(|n| !n.is_empty()));

        let mut output = if looks_like_html(text.as_bytes()) {
            let root = tree::parse_html(&text)?;
            let mut ctx = WalkContext::new(options);
            walk_document(&root, &mut ctx);
            ctx.finish()
        } else {
            plain_text_output(&text, options)
        };

        if output.title.is_none() {
            output.title = title;
        }
        output.warnings.extend(warnings);
        Ok(output)
    }
}

/// MOBI payloads are HTML; bare PalmDoc is plain text. Sniff rather than
/// trust the container type, since PalmDoc files in the wild carry markup.
fn looks_like_html(text: &[u8]) -> bool {
    let finder = |needle: &[u8]| memchr::memmem::find(text, needle).is_some();
    finder(b"<html") || finder(b"<HTML") || finder(b"<body") || finder(b"<p>") || finder(b"<P>")
}

/// Linearize bare PalmDoc text: paragraphs on newlines, pages on the word
/// count threshold.
fn plain_text_output(text: &str, options: &ParseOptions) -> ParseOutput {
    let mut doc = crate::document::DocumentBuilder::new();
    let mut preview = PreviewBuilder::new();
    let target = options.page_target_words.max(1);

    preview.open_unit(0, 0);
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if doc.words_on_page() >= target {
            doc.break_page();
            preview.open_unit(0, doc.next_index());
        }
        doc.break_paragraph();
        preview.open_tag("p");
        tokenize(line, |word| {
            let index = doc.push_word(word, Style::default());
            preview.word(index, word, Style::default());
            preview.raw(" ");
        });
        preview.close_tag("p");
    }

    let document = doc.finish();
    let previews = preview.finish(document.total_words() as u32);
    ParseOutput {
        document,
        previews,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::pdb::test_support::build_pdb;
    use super::*;
    use crate::options::Strictness;

    fn palmdoc_record0(compression: u16, text_length: u32, records: u16, encryption: u16) -> Vec<u8> {
        let mut r = vec![0u8; 16];
        r[0..2].copy_from_slice(&compression.to_be_bytes());
        r[4..8].copy_from_slice(&text_length.to_be_bytes());
        r[8..10].copy_from_slice(&records.to_be_bytes());
        r[12..14].copy_from_slice(&encryption.to_be_bytes());
        r
    }

    fn adapter_parse(image: &[u8]) -> Result<ParseOutput> {
        MobiAdapter.parse(image, &ParseOptions::default())
    }

    #[test]
    fn test_uncompressed_palmdoc_text() {
        let text = b"First paragraph here.\nSecond paragraph.";
        let header = palmdoc_record0(COMPRESSION_NONE, text.len() as u32, 1, 0);
        let image = build_pdb("Plain Book", b"TEXtREAd", &[&header, text]);

        let out = adapter_parse(&image).unwrap();
        assert_eq!(out.title.as_deref(), Some("Plain Book"));
        assert_eq!(out.document.total_paragraphs(), 2);
        assert_eq!(out.document.total_words(), 5);
    }

    #[test]
    fn test_compressed_text_roundtrips() {
        let text = b"the cat sat on the mat and the cat sat on the mat again";
        let compressed = palmdoc::compress(text);
        let header = palmdoc_record0(COMPRESSION_PALMDOC, text.len() as u32, 1, 0);
        let image = build_pdb("C", b"TEXtREAd", &[&header, &compressed]);

        let out = adapter_parse(&image).unwrap();
        let words: Vec<_> = out.document.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(words[..3], ["the", "cat", "sat"]);
        assert_eq!(out.document.total_words(), 14);
    }

    #[test]
    fn test_encrypted_book_fails_with_zero_words() {
        let header = palmdoc_record0(COMPRESSION_PALMDOC, 100, 1, 2);
        let image = build_pdb("DRM", b"BOOKMOBI", &[&header, b"garbage"]);

        let err = adapter_parse(&image).unwrap_err();
        assert_eq!(err.category(), "encrypted-content");
    }

    #[test]
    fn test_huffcdic_unsupported() {
        let header = palmdoc_record0(COMPRESSION_HUFF_CDIC, 100, 1, 0);
        let image = build_pdb("H", b"BOOKMOBI", &[&header, b"x"]);

        let err = adapter_parse(&image).unwrap_err();
        assert_eq!(err.category(), "unsupported-compression");
    }

    #[test]
    fn test_html_payload_routes_through_walker() {
        let text = b"<html><body><p>Hello <i>world</i></p></body></html>";
        let header = palmdoc_record0(COMPRESSION_NONE, text.len() as u32, 1, 0);
        let image = build_pdb("H", b"BOOKMOBI", &[&header, text]);

        let out = adapter_parse(&image).unwrap();
        assert_eq!(out.document.total_words(), 2);
        assert!(out.document.words[1].italic);
    }

    #[test]
    fn test_strict_mode_surfaces_corruption() {
        // A back-reference into nothing: first byte of the record.
        let compound: u16 = (100 << 3) | 0;
        let bad = [0x80 | (compound >> 8) as u8, compound as u8];
        let header = palmdoc_record0(COMPRESSION_PALMDOC, 10, 1, 0);
        let image = build_pdb("B", b"TEXtREAd", &[&header, &bad]);

        let strict = ParseOptions {
            strictness: Strictness::Strict,
            ..Default::default()
        };
        let out = MobiAdapter.parse(&image, &strict).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("corrupt")));
    }

    #[test]
    fn test_wrong_container_type() {
        let image = build_pdb("N", b"DataSPRD", &[b"x"]);
        let err = adapter_parse(&image).unwrap_err();
        assert_eq!(err.category(), "unsupported-format");
    }
}
