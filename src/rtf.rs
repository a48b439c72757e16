//! RTF control-word tokenizer and adapter.
//!
//! RTF is a brace-grouped escape format. The tokenizer scans character by
//! character, tracking group depth, discarding destination groups (font
//! tables, stylesheets, metadata, embedded objects) wholesale, and mapping a
//! fixed set of control words to characters or formatting toggles. It emits
//! plain text plus a parallel per-character italic/bold array; the adapter
//! builds words from that, looking up formatting at each word's start offset.

use crate::document::{DocumentBuilder, ParseOutput, Style};
use crate::error::{Error, Result};
use crate::options::ParseOptions;
use crate::preview::PreviewBuilder;
use crate::registry::FormatAdapter;
use crate::util::decode_text;
use crate::words::split_token;

/// Destination groups whose entire content is discarded.
const SKIP_DESTINATIONS: &[&str] = &[
    "fonttbl", "colortbl", "stylesheet", "info", "pict", "object", "header",
    "footer", "footnote", "listtable", "listoverridetable", "generator",
    "themedata", "colorschememapping", "datastore", "xmlnstbl",
];

/// Tokenizer output: plain text plus one style entry per `char`.
#[derive(Debug, Default)]
pub struct PlainText {
    pub text: String,
    pub styles: Vec<Style>,
}

impl PlainText {
    fn push(&mut self, c: char, style: Style) {
        self.text.push(c);
        self.styles.push(style);
    }

    fn push_str(&mut self, s: &str, style: Style) {
        for c in s.chars() {
            self.push(c, style);
        }
    }
}

/// Strip RTF control structure down to plain text with per-char formatting.
///
/// Paragraph breaks surface as `\n`. Idempotent on text containing no control
/// sequences: the output text equals the input and every flag is false.
pub fn tokenize_rtf(input: &str) -> PlainText {
    let mut out = PlainText::default();
    let mut chars = input.chars().peekable();
    let mut style = Style::default();
    // Saved formatting state per open group.
    let mut group_stack: Vec<Style> = Vec::new();
    // When inside a discarded destination: depth at which it started.
    let mut skip_until_depth: Option<usize> = None;
    // Bytes of a pending \uN placeholder still to swallow.
    let mut unicode_placeholder = 0usize;

    while let Some(c) = chars.next() {
        let skipping = skip_until_depth.is_some();
        match c {
            '{' => group_stack.push(style),
            '}' => {
                if let Some(saved) = group_stack.pop() {
                    style = saved;
                }
                if let Some(depth) = skip_until_depth
                    && group_stack.len() < depth
                {
                    skip_until_depth = None;
                }
            }
            '\\' => {
                let Some(&next) = chars.peek() else { break };
                if next.is_ascii_alphabetic() {
                    let (word, parameter) = read_control_word(&mut chars);
                    if skipping {
                        continue;
                    }
                    if SKIP_DESTINATIONS.contains(&word.as_str()) {
                        skip_until_depth = Some(group_stack.len());
                        continue;
                    }
                    apply_control_word(
                        &word,
                        parameter,
                        &mut style,
                        &mut out,
                        &mut unicode_placeholder,
                    );
                } else {
                    // Control symbol.
                    chars.next();
                    if skipping {
                        continue;
                    }
                    match next {
                        '\\' | '{' | '}' => out.push(next, style),
                        '~' => out.push('\u{a0}', style),
                        '-' => {} // optional hyphen
                        '_' => out.push('-', style),
                        '*' => {
                            // \* marks the following destination ignorable.
                            if !skipping {
                                skip_until_depth = Some(group_stack.len());
                            }
                        }
                        '\'' => {
                            let hex: String = chars.by_ref().take(2).collect();
                            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                                let bytes = [byte];
                                let (decoded, _, _) =
                                    encoding_rs::WINDOWS_1252.decode(&bytes);
                                out.push_str(&decoded, style);
                            }
                        }
                        '\n' | '\r' => out.push('\n', style),
                        _ => {}
                    }
                }
            }
            '\n' | '\r' => {} // raw newlines are not breaks in RTF
            _ => {
                if skipping {
                    continue;
                }
                if unicode_placeholder > 0 {
                    unicode_placeholder -= 1;
                    continue;
                }
                out.push(c, style);
            }
        }
    }

    out
}

/// Read the letters of a control word plus its optional signed parameter,
/// consuming one trailing space delimiter if present.
fn read_control_word(chars: &mut std::iter::Peekable<std::str::Chars>) -> (String, Option<i32>) {
    let mut word = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphabetic() {
            word.push(c);
            chars.next();
        } else {
            break;
        }
    }

    let mut parameter = None;
    let negative = chars.peek() == Some(&'-');
    if negative {
        chars.next();
    }
    if chars.peek().is_some_and(|c| c.is_ascii_digit()) {
        let mut value: i64 = 0;
        while let Some(&c) = chars.peek() {
            if let Some(d) = c.to_digit(10) {
                value = (value * 10 + d as i64).min(i32::MAX as i64);
                chars.next();
            } else {
                break;
            }
        }
        parameter = Some(if negative { -value as i32 } else { value as i32 });
    }

    // A single space after the control word is part of it.
    if chars.peek() == Some(&' ') {
        chars.next();
    }
    (word, parameter)
}

fn apply_control_word(
    word: &str,
    parameter: Option<i32>,
    style: &mut Style,
    out: &mut PlainText,
    unicode_placeholder: &mut usize,
) {
    // A parameter of exactly 0 turns a toggle off; anything else, including
    // no parameter, turns it on.
    let toggled_on = parameter != Some(0);
    match word {
        "par" | "sect" | "page" => out.push('\n', *style),
        "line" => out.push('\n', *style),
        "tab" | "cell" => out.push(' ', *style),
        "i" => style.italic = toggled_on,
        "b" => style.bold = toggled_on,
        "plain" => *style = Style::default(),
        "emdash" => out.push('\u{2014}', *style),
        "endash" => out.push('\u{2013}', *style),
        "lquote" => out.push('\u{2018}', *style),
        "rquote" => out.push('\u{2019}', *style),
        "ldblquote" => out.push('\u{201c}', *style),
        "rdblquote" => out.push('\u{201d}', *style),
        "bullet" => out.push('\u{2022}', *style),
        "u" => {
            // \uN: signed 16-bit codepoint, then one ASCII fallback char to
            // swallow.
            if let Some(value) = parameter {
                let code = if value < 0 { value + 65536 } else { value } as u32;
                if let Some(c) = char::from_u32(code) {
                    out.push(c, *style);
                }
            }
            *unicode_placeholder = 1;
        }
        _ => {}
    }
}

pub struct RtfAdapter;

impl FormatAdapter for RtfAdapter {
    fn name(&self) -> &'static str {
        "RTF"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rtf"]
    }

    fn media_types(&self) -> &'static [&'static str] {
        &["application/rtf", "text/rtf"]
    }

    fn parse(&self, input: &[u8], options: &ParseOptions) -> Result<ParseOutput> {
        let source = decode_text(input, Some("windows-1252"));
        if !source.trim_start().starts_with("{\\rtf") {
            return Err(Error::CorruptContainer(
                "missing {\\rtf header; not an RTF file".into(),
            ));
        }

        let plain = tokenize_rtf(&source);
        let mut doc = DocumentBuilder::new();
        let mut preview = PreviewBuilder::new();
        let target = options.page_target_words.max(1);
        preview.open_unit(0, 0);

        // The styles array is parallel per char; track char offsets while
        // splitting into paragraphs and words.
        let mut offset = 0usize;
        for paragraph in plain.text.split('\n') {
            let chars: Vec<char> = paragraph.chars().collect();
            if paragraph.trim().is_empty() {
                offset += chars.len() + 1;
                continue;
            }
            if doc.words_on_page() >= target {
                doc.break_page();
                preview.open_unit(0, doc.next_index());
            }
            doc.break_paragraph();
            preview.open_tag("p");

            let mut i = 0;
            while i < chars.len() {
                if chars[i].is_whitespace() {
                    i += 1;
                    continue;
                }
                let start = i;
                while i < chars.len() && !chars[i].is_whitespace() {
                    i += 1;
                }
                let token: String = chars[start..i].iter().collect();
                let style = plain.styles[offset + start];
                for part in split_token(&token) {
                    let index = doc.push_word(part, style);
                    preview.word(index, part, style);
                    preview.raw(" ");
                }
            }

            preview.close_tag("p");
            offset += chars.len() + 1;
        }

        let document = doc.finish();
        let previews = preview.finish(document.total_words() as u32);
        Ok(ParseOutput {
            document,
            previews,
            ..Default::default()
        })
    }
}
