//! Inline Markdown rendering.
//!
//! Single left-to-right scan with explicit toggle state. Emphasis markers
//! flip style flags; each word takes the style active at its first character.
//! Inline code spans are verbatim, rendered as `<code>`, and contribute no
//! words. Link labels contribute words, link targets do not. Images are
//! dropped entirely.

use crate::document::{DocumentBuilder, Style};
use crate::preview::escape;
use crate::words::split_token;

#[derive(Debug, Default, Clone, Copy)]
struct Toggles {
    star_italic: bool,
    star_bold: bool,
    underscore_italic: bool,
    underscore_bold: bool,
}

impl Toggles {
    fn style(&self, base: Style) -> Style {
        Style {
            italic: base.italic || self.star_italic || self.underscore_italic,
            bold: base.bold || self.star_bold || self.underscore_bold,
        }
    }
}

/// Render one run of inline text: push words into `doc` and word-marker
/// markup into `markup`.
pub(crate) fn render_inline(
    text: &str,
    base: Style,
    doc: &mut DocumentBuilder,
    markup: &mut String,
) {
    let chars: Vec<char> = text.chars().collect();
    let mut toggles = Toggles::default();
    let mut buffer = String::new();
    let mut token_style = base;
    let mut i = 0;

    macro_rules! flush {
        () => {
            if !buffer.is_empty() {
                emit_token(&buffer, token_style, doc, markup);
                buffer.clear();
            }
        };
    }

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => {
                flush!();
                i += 1;
            }
            '`' => {
                // Inline code: verbatim through to the closing backtick,
                // excluded from emphasis and from the word stream.
                if let Some(close) = chars[i + 1..].iter().position(|&c| c == '`') {
                    flush!();
                    let code: String = chars[i + 1..i + 1 + close].iter().collect();
                    markup.push_str("<code>");
                    markup.push_str(&escape(&code));
                    markup.push_str("</code> ");
                    i += close + 2;
                } else {
                    push_char(&mut buffer, '`', &mut token_style, toggles.style(base));
                    i += 1;
                }
            }
            '!' if chars.get(i + 1) == Some(&'[') => {
                // Image: dropped, no words.
                match parse_link(&chars, i + 1) {
                    Some((_, _, after)) => i = after,
                    None => {
                        push_char(&mut buffer, '!', &mut token_style, toggles.style(base));
                        i += 1;
                    }
                }
            }
            '[' => match parse_link(&chars, i) {
                Some((label, href, after)) => {
                    flush!();
                    if !href.is_empty() {
                        markup.push_str(&format!("<a href=\"{}\">", escape(&href)));
                    }
                    // Only the visible label contributes words.
                    render_inline(&label, toggles.style(base), doc, markup);
                    if !href.is_empty() {
                        markup.push_str("</a> ");
                    }
                    i = after;
                }
                None => {
                    push_char(&mut buffer, '[', &mut token_style, toggles.style(base));
                    i += 1;
                }
            },
            '*' => {
                let run = run_length(&chars, i, '*');
                match run {
                    1 => toggles.star_italic = !toggles.star_italic,
                    2 => toggles.star_bold = !toggles.star_bold,
                    _ => {
                        toggles.star_italic = !toggles.star_italic;
                        toggles.star_bold = !toggles.star_bold;
                    }
                }
                // Style for an empty buffer follows the marker.
                if buffer.is_empty() {
                    token_style = toggles.style(base);
                }
                i += run.min(3);
            }
            '_' => {
                let run = run_length(&chars, i, '_').min(2);
                // Underscores inside identifiers stay literal.
                let prev_word = i > 0 && is_word_char(chars[i - 1]);
                let next_word = chars
                    .get(i + run)
                    .copied()
                    .is_some_and(is_word_char);
                if prev_word && next_word {
                    for _ in 0..run {
                        push_char(&mut buffer, '_', &mut token_style, toggles.style(base));
                    }
                } else {
                    if run == 2 {
                        toggles.underscore_bold = !toggles.underscore_bold;
                    } else {
                        toggles.underscore_italic = !toggles.underscore_italic;
                    }
                    if buffer.is_empty() {
                        token_style = toggles.style(base);
                    }
                }
                i += run;
            }
            _ => {
                push_char(&mut buffer, c, &mut token_style, toggles.style(base));
                i += 1;
            }
        }
    }
    flush!();
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn run_length(chars: &[char], from: usize, which: char) -> usize {
    chars[from..].iter().take_while(|&&c| c == which).count()
}

fn push_char(buffer: &mut String, c: char, token_style: &mut Style, current: Style) {
    if buffer.is_empty() {
        *token_style = current;
    }
    buffer.push(c);
}

/// Parse `[label](href)` starting at the `[`. Returns (label, href, index
/// after the construct). A bare `[label]` without a target yields an empty
/// href.
fn parse_link(chars: &[char], open: usize) -> Option<(String, String, usize)> {
    let close = chars[open + 1..].iter().position(|&c| c == ']')? + open + 1;
    let label: String = chars[open + 1..close].iter().collect();

    if chars.get(close + 1) == Some(&'(') {
        let href_close = chars[close + 2..].iter().position(|&c| c == ')')? + close + 2;
        let href: String = chars[close + 2..href_close].iter().collect();
        Some((label, href, href_close + 1))
    } else {
        Some((label, String::new(), close + 1))
    }
}

fn emit_token(token: &str, style: Style, doc: &mut DocumentBuilder, markup: &mut String) {
    for part in split_token(token) {
        let index = doc.push_word(part, style);
        if style.italic {
            markup.push_str("<em>");
        }
        if style.bold {
            markup.push_str("<strong>");
        }
        markup.push_str(&format!(
            "<span data-word-index=\"{}\">{}</span>",
            index,
            escape(part)
        ));
        if style.bold {
            markup.push_str("</strong>");
        }
        if style.italic {
            markup.push_str("</em>");
        }
    }
    markup.push(' ');
}
