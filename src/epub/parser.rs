//! EPUB packaging parsers (container.xml, OPF, NCX, nav document).

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::tree;

/// Parsed OPF package data.
pub struct OpfData {
    pub title: Option<String>,
    pub author: Option<String>,
    /// Maps manifest id -> (href, media_type).
    pub manifest: HashMap<String, (String, String)>,
    pub spine_ids: Vec<String>,
    /// EPUB 2 NCX table of contents, from the spine `toc` attribute.
    pub ncx_href: Option<String>,
    /// EPUB 3 navigation document, from `properties="nav"`.
    pub nav_href: Option<String>,
}

/// Parse META-INF/container.xml to find the OPF path.
pub fn parse_container_xml(content: &str) -> Result<String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"rootfile" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        return Ok(String::from_utf8(attr.value.to_vec())?);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Err(Error::CorruptContainer(
        "no rootfile found in container.xml".into(),
    ))
}

pub fn parse_opf(content: &str) -> Result<OpfData> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut title = None;
    let mut author = None;
    let mut manifest: HashMap<String, (String, String)> = HashMap::new();
    let mut spine_ids: Vec<String> = Vec::new();
    let mut nav_href: Option<String> = None;
    let mut toc_id: Option<String> = None;

    let mut in_metadata = false;
    let mut current_element: Option<&'static str> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"metadata" => in_metadata = true,
                    b"title" if in_metadata => {
                        current_element = Some("title");
                        buf_text.clear();
                    }
                    b"creator" if in_metadata => {
                        current_element = Some("creator");
                        buf_text.clear();
                    }
                    b"spine" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"toc" {
                                toc_id = Some(String::from_utf8(attr.value.to_vec())?);
                            }
                        }
                    }
                    // Some packagers write manifest/spine entries as open
                    // tags instead of self-closing.
                    b"item" | b"itemref" => {
                        handle_entry(&e, &mut manifest, &mut spine_ids, &mut nav_href)?;
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"item" | b"itemref" => {
                        handle_entry(&e, &mut manifest, &mut spine_ids, &mut nav_href)?;
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if current_element.is_some()
                    && let Some(resolved) = tree::resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    buf_text.push_str(&resolved);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"metadata" {
                    in_metadata = false;
                }
                match current_element.take() {
                    Some("title") if title.is_none() => title = Some(buf_text.clone()),
                    Some("creator") if author.is_none() => author = Some(buf_text.clone()),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    let ncx_href = toc_id
        .and_then(|id| manifest.get(&id))
        .map(|(href, _)| href.clone());

    Ok(OpfData {
        title,
        author,
        manifest,
        spine_ids,
        ncx_href,
        nav_href,
    })
}

fn handle_entry(
    e: &BytesStart<'_>,
    manifest: &mut HashMap<String, (String, String)>,
    spine_ids: &mut Vec<String>,
    nav_href: &mut Option<String>,
) -> Result<()> {
    match local_name(e.name().as_ref()) {
        b"item" => {
            let mut id = String::new();
            let mut href = String::new();
            let mut media_type = String::new();
            let mut properties = String::new();

            for attr in e.attributes().flatten() {
                match attr.key.as_ref() {
                    b"id" => id = String::from_utf8(attr.value.to_vec())?,
                    b"href" => href = String::from_utf8(attr.value.to_vec())?,
                    b"media-type" => media_type = String::from_utf8(attr.value.to_vec())?,
                    b"properties" => properties = String::from_utf8(attr.value.to_vec())?,
                    _ => {}
                }
            }

            if properties.split_ascii_whitespace().any(|p| p == "nav") {
                *nav_href = Some(href.clone());
            }
            if !id.is_empty() {
                manifest.insert(id, (href, media_type));
            }
        }
        b"itemref" => {
            for attr in e.attributes().flatten() {
                if attr.key.as_ref() == b"idref" {
                    spine_ids.push(String::from_utf8(attr.value.to_vec())?);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Parse an EPUB 2 NCX into a flat (title, src) list in play order.
/// Nesting is flattened; the word stream is linear anyway.
pub fn parse_ncx(content: &str) -> Result<Vec<(String, String)>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut pending_text: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"navPoint" => pending_text = None,
                    b"text" => in_text = true,
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"content" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"src"
                            && let Some(text) = pending_text.take()
                        {
                            entries
                                .push((text, String::from_utf8(attr.value.to_vec())?));
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if in_text {
                    let raw = String::from_utf8_lossy(e.as_ref());
                    match &mut pending_text {
                        Some(existing) => existing.push_str(&raw),
                        None => pending_text = Some(raw.into_owned()),
                    }
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text
                    && let Some(resolved) = tree::resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    match &mut pending_text {
                        Some(existing) => existing.push_str(&resolved),
                        None => pending_text = Some(resolved),
                    }
                }
            }
            Ok(Event::End(e)) => {
                if local_name(e.name().as_ref()) == b"text" {
                    in_text = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(entries)
}

/// Parse an EPUB 3 navigation document into a flat (title, href) list.
pub fn parse_nav(content: &str) -> Result<Vec<(String, String)>> {
    let root = tree::parse_html(content)?;
    let mut entries = Vec::new();
    if let Some(nav) = root.find("nav") {
        collect_nav_anchors(nav, &mut entries);
    }
    Ok(entries)
}

fn collect_nav_anchors(el: &tree::Element, out: &mut Vec<(String, String)>) {
    for node in &el.children {
        if let tree::Node::Element(child) = node {
            if child.name == "a"
                && let Some(href) = child.attr("href")
            {
                let text = child.text_content();
                if !text.is_empty() {
                    out.push((text, href.to_string()));
                }
            }
            collect_nav_anchors(child, out);
        }
    }
}

/// Strip UTF-8 BOM if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Join an href against the OPF directory.
pub fn resolve_path(base: &str, href: &str) -> String {
    if base.is_empty() {
        href.to_string()
    } else {
        format!("{}/{}", base, href)
    }
}

/// Extract local name from a potentially namespaced XML name.
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_xml() {
        let xml = r#"<?xml version="1.0"?>
            <container><rootfiles>
              <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
            </rootfiles></container>"#;
        assert_eq!(parse_container_xml(xml).unwrap(), "OEBPS/content.opf");
    }

    #[test]
    fn test_container_without_rootfile_fails() {
        let err = parse_container_xml("<container/>").unwrap_err();
        assert_eq!(err.category(), "corrupt-container");
    }

    #[test]
    fn test_opf_metadata_and_spine() {
        let opf = r#"<package xmlns:dc="http://purl.org/dc/elements/1.1/">
          <metadata>
            <dc:title>A Tale</dc:title>
            <dc:creator>Jane Doe</dc:creator>
          </metadata>
          <manifest>
            <item id="c1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
            <item id="c2" href="ch2.xhtml" media-type="application/xhtml+xml"/>
            <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
            <item id="nav" href="nav.xhtml" properties="nav" media-type="application/xhtml+xml"/>
          </manifest>
          <spine toc="ncx">
            <itemref idref="c1"/>
            <itemref idref="c2"/>
          </spine>
        </package>"#;
        let data = parse_opf(opf).unwrap();
        assert_eq!(data.title.as_deref(), Some("A Tale"));
        assert_eq!(data.author.as_deref(), Some("Jane Doe"));
        assert_eq!(data.spine_ids, vec!["c1", "c2"]);
        assert_eq!(data.ncx_href.as_deref(), Some("toc.ncx"));
        assert_eq!(data.nav_href.as_deref(), Some("nav.xhtml"));
        assert_eq!(data.manifest["c2"].0, "ch2.xhtml");
    }

    #[test]
    fn test_opf_entries_written_as_open_tags() {
        let opf = r#"<package>
          <manifest>
            <item id="c1" href="ch1.xhtml" media-type="application/xhtml+xml"></item>
          </manifest>
          <spine>
            <itemref idref="c1"></itemref>
          </spine>
        </package>"#;
        let data = parse_opf(opf).unwrap();
        assert_eq!(data.spine_ids, vec!["c1"]);
        assert_eq!(data.manifest["c1"].0, "ch1.xhtml");
    }

    #[test]
    fn test_ncx_flat_entries() {
        let ncx = r#"<ncx><navMap>
          <navPoint id="n1" playOrder="1">
            <navLabel><text>Chapter One</text></navLabel>
            <content src="ch1.xhtml"/>
            <navPoint id="n2" playOrder="2">
              <navLabel><text>Section</text></navLabel>
              <content src="ch1.xhtml#s1"/>
            </navPoint>
          </navPoint>
        </navMap></ncx>"#;
        let entries = parse_ncx(ncx).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("Chapter One".into(), "ch1.xhtml".into()));
        assert_eq!(entries[1].1, "ch1.xhtml#s1");
    }

    #[test]
    fn test_nav_anchors() {
        let nav = r#"<html><body><nav epub:type="toc"><ol>
            <li><a href="ch1.xhtml">One</a></li>
            <li><a href="ch2.xhtml">Two</a></li>
        </ol></nav></body></html>"#;
        let entries = parse_nav(nav).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1], ("Two".into(), "ch2.xhtml".into()));
    }

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom(&[0xEF, 0xBB, 0xBF, b'a']), b"a");
        assert_eq!(strip_bom(b"abc"), b"abc");
    }
}
