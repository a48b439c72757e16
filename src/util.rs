//! Shared text utilities.

use std::borrow::Cow;

/// Decode bytes to a string, handling various encodings.
///
/// Tries UTF-8 first (BOM handled by encoding_rs), then the hint encoding
/// (from an XML declaration or a container codepage field), then falls back
/// to Windows-1252, which is common in old ebooks.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);
    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Generate a GitHub-style slug from heading text.
///
/// Lowercases ASCII alphanumerics, collapses whitespace/hyphen/underscore
/// runs to single hyphens, drops everything else: "Hello, World!" becomes
/// "hello-world", "  Multiple   Spaces  " becomes "multiple-spaces".
pub fn slugify(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|&c| c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
