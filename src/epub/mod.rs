//! EPUB adapter.
//!
//! An EPUB is a zip container: META-INF/container.xml points at the OPF
//! package file, the OPF's spine lists chapter documents in reading order,
//! and an NCX (EPUB 2) or nav document (EPUB 3) supplies chapter titles.
//! Each spine document is parsed leniently and walked with the shared HTML
//! walker; a chapter that fails to parse becomes a warning, not a failure,
//! so one corrupt chapter never loses the rest of the book.

mod parser;

use std::collections::HashMap;
use std::io::{Cursor, Read};

use percent_encoding::percent_decode_str;
use zip::ZipArchive;

use crate::document::{ParseOutput, Style};
use crate::error::{Error, Result};
use crate::html::{WalkContext, walk_children};
use crate::options::ParseOptions;
use crate::registry::FormatAdapter;
use crate::tree;
use crate::util::decode_text;

use parser::{OpfData, parse_container_xml, parse_nav, parse_ncx, parse_opf, resolve_path, strip_bom};

pub struct EpubAdapter;

impl FormatAdapter for EpubAdapter {
    fn name(&self) -> &'static str {
        "EPUB"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["epub"]
    }

    fn media_types(&self) -> &'static [&'static str] {
        &["application/epub+zip"]
    }

    fn parse(&self, input: &[u8], options: &ParseOptions) -> Result<ParseOutput> {
        let cursor = Cursor::new(input);
        let mut archive = ZipArchive::new(cursor)?;

        let container = read_archive_string(&mut archive, "META-INF/container.xml")?;
        let opf_path = parse_container_xml(&container)?;
        let opf_content = read_archive_string(&mut archive, &opf_path)?;
        let opf = parse_opf(&opf_content)?;

        if opf.spine_ids.is_empty() {
            return Err(Error::EmptyResult("EPUB spine lists no documents".into()));
        }

        let base = opf_path
            .rfind('/')
            .map(|i| &opf_path[..i])
            .unwrap_or("")
            .to_string();
        let toc = load_toc(&mut archive, &opf, &base);

        let mut ctx = WalkContext::new(options);
        ctx.title = opf.title.clone();
        ctx.author = opf.author.clone();

        for (n, id) in opf.spine_ids.iter().enumerate() {
            let Some((href, _media_type)) = opf.manifest.get(id) else {
                ctx.warnings
                    .push(format!("spine item {} not in manifest", id));
                continue;
            };
            let path = resolve_path(&base, href);
            let content = match read_archive_string(&mut archive, &path) {
                Ok(content) => content,
                Err(e) => {
                    ctx.warnings
                        .push(format!("could not read chapter {}: {}", href, e));
                    continue;
                }
            };
            let root = match tree::parse_html(&content) {
                Ok(root) => root,
                Err(e) => {
                    ctx.warnings
                        .push(format!("could not parse chapter {}: {}", href, e));
                    continue;
                }
            };

            let title = toc
                .get(href.as_str())
                .cloned()
                .unwrap_or_else(|| format!("Chapter {}", n + 1));
            ctx.begin_chapter(&title, href);

            match root.find("body") {
                Some(body) => walk_children(body, Style::default(), &mut ctx),
                None => walk_children(&root, Style::default(), &mut ctx),
            }
        }

        Ok(ctx.finish())
    }
}

/// Chapter titles keyed by manifest href (fragment stripped). NCX takes
/// precedence; the EPUB 3 nav document fills gaps.
fn load_toc<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    opf: &OpfData,
    base: &str,
) -> HashMap<String, String> {
    let mut toc = HashMap::new();

    let add_entries = |entries: Vec<(String, String)>, toc: &mut HashMap<String, String>| {
        for (title, src) in entries {
            let href = src.split('#').next().unwrap_or(&src).to_string();
            toc.entry(href).or_insert(title);
        }
    };

    if let Some(href) = &opf.ncx_href
        && let Ok(content) = read_archive_string(archive, &resolve_path(base, href))
        && let Ok(entries) = parse_ncx(&content)
    {
        add_entries(entries, &mut toc);
    }
    if let Some(href) = &opf.nav_href
        && let Ok(content) = read_archive_string(archive, &resolve_path(base, href))
        && let Ok(entries) = parse_nav(&content)
    {
        add_entries(entries, &mut toc);
    }

    toc
}

/// Read a file from the archive as text, retrying with the percent-decoded
/// name. Some packagers encode hrefs that the zip directory stores raw.
fn read_archive_string<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<String> {
    let bytes = match read_archive_bytes(archive, path) {
        Ok(bytes) => bytes,
        Err(first) => {
            let decoded = percent_decode_str(path).decode_utf8_lossy();
            if decoded != path {
                read_archive_bytes(archive, &decoded)?
            } else {
                return Err(first);
            }
        }
    };
    Ok(decode_text(strip_bom(&bytes), None).into_owned())
}

fn read_archive_bytes<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<u8>> {
    let mut file = archive.by_name(path)?;
    let mut bytes = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}
