//! Lenient tag-tree construction.
//!
//! All tree walkers (HTML, EPUB chapter bodies, FictionBook, DOCX) consume
//! the same node shape. Container- and dialect-specific quirks are translated
//! here, at the edge, so walker code never probes alternative layouts.
//!
//! The parser is tolerant by design: mismatched end tags auto-close
//! intervening elements, stray end tags are ignored, and HTML void elements
//! (`<br>`, `<img>`, ...) never wait for a closing tag.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::Result;

/// One element in the tree.
#[derive(Debug, Clone, Default)]
pub struct Element {
    /// Tag name with any namespace prefix stripped, lowercased.
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    /// First attribute value by name (namespace prefixes stripped).
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|n| match n {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// All direct child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter_map(move |n| match n {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// First element with the given name anywhere in this subtree.
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|n| match n {
            Node::Element(el) => el.find(name),
            _ => None,
        })
    }

    /// Concatenated text content of this subtree, whitespace-normalized.
    pub fn text_content(&self) -> String {
        let mut raw = String::new();
        collect_text(self, &mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn collect_text(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => {
                collect_text(e, out);
                out.push(' ');
            }
        }
    }
}

/// HTML elements that never have content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "source", "track", "wbr",
];

/// Parse an XML document into a tree rooted at a synthetic element.
pub fn parse_xml(input: &str) -> Result<Element> {
    parse(input, false)
}

/// Parse HTML/XHTML leniently: void elements self-close, end-tag checking is
/// off, unknown entities degrade to nothing rather than erroring.
pub fn parse_html(input: &str) -> Result<Element> {
    parse(input, true)
}

fn parse(input: &str, html: bool) -> Result<Element> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().check_end_names = false;

    // Stack of open elements; index 0 is the synthetic root.
    let mut stack: Vec<Element> = vec![Element {
        name: "#root".to_string(),
        ..Default::default()
    }];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let el = element_from(&e);
                if html && VOID_ELEMENTS.contains(&el.name.as_str()) {
                    push_child(&mut stack, Node::Element(el));
                } else {
                    stack.push(el);
                }
            }
            Ok(Event::Empty(e)) => {
                push_child(&mut stack, Node::Element(element_from(&e)));
            }
            Ok(Event::End(e)) => {
                let name = normalize_name(e.name().as_ref());
                // Find the matching open element; auto-close anything above
                // it, ignore the end tag entirely if nothing matches.
                if let Some(pos) = stack.iter().rposition(|el| el.name == name)
                    && pos > 0
                {
                    while stack.len() > pos {
                        let done = stack.pop().expect("stack underflow");
                        push_child(&mut stack, Node::Element(done));
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let raw = String::from_utf8_lossy(e.as_ref());
                push_text(&mut stack, &raw);
            }
            Ok(Event::CData(e)) => {
                let raw = String::from_utf8_lossy(e.as_ref());
                push_text(&mut stack, &raw);
            }
            Ok(Event::GeneralRef(e)) => {
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(resolved) = resolve_entity(&entity) {
                    push_text(&mut stack, &resolved);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) if html => {
                // Lenient mode: salvage whatever parsed before the error.
                log::debug!("lenient parse stopped early: {e}");
                break;
            }
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }

    // Auto-close whatever is still open.
    while stack.len() > 1 {
        let done = stack.pop().expect("stack underflow");
        push_child(&mut stack, Node::Element(done));
    }
    Ok(stack.pop().expect("root"))
}

fn element_from(e: &BytesStart) -> Element {
    let name = normalize_name(e.name().as_ref());
    let mut attrs = Vec::new();
    for attr in e.attributes().flatten() {
        let key = normalize_name(attr.key.as_ref());
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        attrs.push((key, value));
    }
    Element {
        name,
        attrs,
        children: Vec::new(),
    }
}

/// Strip namespace prefix and lowercase.
fn normalize_name(name: &[u8]) -> String {
    let local = name
        .iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name);
    String::from_utf8_lossy(local).to_ascii_lowercase()
}

fn push_child(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn push_text(stack: &mut [Element], text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(parent) = stack.last_mut() {
        // Coalesce adjacent text nodes (entity references split them).
        if let Some(Node::Text(existing)) = parent.children.last_mut() {
            existing.push_str(text);
            return;
        }
        parent.children.push(Node::Text(text.to_string()));
    }
}

/// Resolve a named or numeric entity reference to its text.
pub fn resolve_entity(entity: &str) -> Option<String> {
    let named = match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "copy" => "\u{a9}",
        "shy" => "",
        _ => "",
    };
    if !named.is_empty() || matches!(entity, "shy") {
        return Some(named.to_string());
    }

    // Numeric: &#8217; or &#x2019;
    let code = entity.strip_prefix('#')?;
    let value = if let Some(hex) = code.strip_prefix(['x', 'X']) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        code.parse::<u32>().ok()?
    };
    char::from_u32(value).map(|c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_tree() {
        let root = parse_xml("<a><b x=\"1\">hi</b><c/></a>").unwrap();
        let a = root.child("a").unwrap();
        assert_eq!(a.children.len(), 2);
        let b = a.child("b").unwrap();
        assert_eq!(b.attr("x"), Some("1"));
        assert_eq!(b.text_content(), "hi");
    }

    #[test]
    fn test_namespace_prefix_stripped() {
        let root = parse_xml("<w:p><w:t>text</w:t></w:p>").unwrap();
        let p = root.child("p").unwrap();
        assert_eq!(p.child("t").unwrap().text_content(), "text");
    }

    #[test]
    fn test_void_elements_in_html() {
        let root = parse_html("<p>one<br>two<img src=\"x.png\">three</p>").unwrap();
        let p = root.child("p").unwrap();
        assert!(p.child("br").is_some());
        assert!(p.child("img").is_some());
        assert_eq!(p.text_content(), "one two three");
    }

    #[test]
    fn test_mismatched_end_tag_autocloses() {
        let root = parse_html("<div><p>one</div>").unwrap();
        let div = root.child("div").unwrap();
        assert_eq!(div.child("p").unwrap().text_content(), "one");
    }

    #[test]
    fn test_stray_end_tag_ignored() {
        let root = parse_html("<p>one</i>two</p>").unwrap();
        assert_eq!(root.child("p").unwrap().text_content(), "onetwo");
    }

    #[test]
    fn test_entities() {
        let root = parse_xml("<p>a &amp; b &#x2019;</p>").unwrap();
        assert_eq!(root.child("p").unwrap().text_content(), "a & b \u{2019}");
        assert_eq!(resolve_entity("#65").as_deref(), Some("A"));
        assert_eq!(resolve_entity("bogus"), None);
    }

    #[test]
    fn test_find_descends() {
        let root = parse_xml("<a><b><c>deep</c></b></a>").unwrap();
        assert_eq!(root.find("c").unwrap().text_content(), "deep");
    }
}
