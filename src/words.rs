//! Word-splitting primitive shared by every format adapter.
//!
//! All adapters tokenize through these helpers so word counts are comparably
//! granular regardless of source format.

/// Dash characters that split a token into sub-words.
const DASHES: [char; 3] = ['-', '\u{2013}', '\u{2014}'];

fn is_dash(c: char) -> bool {
    DASHES.contains(&c)
}

/// Split one whitespace-delimited token on interior dashes.
///
/// A run of dashes splits the token only when readable characters exist on
/// both sides; leading and trailing dashes stay attached. The dash run stays
/// with the preceding sub-word so hyphenated halves still read naturally.
///
/// ```
/// use glance::words::split_token;
///
/// assert_eq!(split_token("well-known"), vec!["well-", "known"]);
/// assert_eq!(split_token("-dash"), vec!["-dash"]);
/// assert_eq!(split_token("dash-"), vec!["dash-"]);
/// assert_eq!(split_token("a\u{2014}b"), vec!["a\u{2014}", "b"]);
/// ```
pub fn split_token(token: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut seen_text = false;
    let mut iter = token.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if !is_dash(c) {
            seen_text = true;
            continue;
        }
        // Consume the whole dash run.
        let mut end = i + c.len_utf8();
        while let Some(&(j, d)) = iter.peek() {
            if is_dash(d) {
                end = j + d.len_utf8();
                iter.next();
            } else {
                break;
            }
        }
        // Interior only: text before the run and text after it.
        if seen_text && end < token.len() {
            parts.push(&token[start..end]);
            start = end;
            seen_text = false;
        }
    }

    if start < token.len() || parts.is_empty() {
        parts.push(&token[start..]);
    }
    parts
}

/// Tokenize a raw text run: split on whitespace, then on interior dashes.
/// Calls `emit` once per resulting word, in order.
pub fn tokenize(text: &str, mut emit: impl FnMut(&str)) {
    for token in text.split_whitespace() {
        for part in split_token(token) {
            emit(part);
        }
    }
}
