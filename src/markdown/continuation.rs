//! Paragraph-continuation repair.
//!
//! Text reflowed from fixed-width sources often arrives with hard line
//! breaks (and stray blank lines) in the middle of sentences. This pre-pass
//! merges a line that ends without terminal punctuation into a following
//! non-blank line that looks like a sentence continuation, skipping blank
//! lines in between. The heuristics are deliberately tunable policy: a line
//! ending with an abbreviation will defeat them, which is why the caller can
//! switch the pass off entirely.

/// Words that mark a line as a sentence continuation even though
/// lowercase-start already catches most of them.
const CONTINUATION_WORDS: &[&str] = &["and", "but", "or", "nor", "so", "yet", "for"];

const TERMINAL_PUNCTUATION: &[char] =
    &['.', '!', '?', ':', ';', '"', '\'', '\u{201d}', '\u{2019}', '\u{2026}'];

fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

/// A line with no special block meaning: candidate for merging.
fn is_plain_text(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || is_fence(line) {
        return false;
    }
    if line.starts_with("    ") || line.starts_with('\t') {
        return false;
    }
    if trimmed.starts_with('#') || trimmed.starts_with('>') {
        return false;
    }
    if super::is_horizontal_rule(trimmed) {
        return false;
    }
    if trimmed.starts_with("- ")
        || trimmed.starts_with("* ")
        || trimmed.starts_with("+ ")
        || trimmed.starts_with("**")
    {
        return false;
    }
    // Ordered list marker: digits then a dot.
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 && trimmed[digits..].starts_with(". ") {
        return false;
    }
    true
}

fn ends_with_terminal(line: &str) -> bool {
    line.trim_end()
        .chars()
        .last()
        .is_some_and(|c| TERMINAL_PUNCTUATION.contains(&c))
}

fn is_continuation_start(line: &str) -> bool {
    let trimmed = line.trim_start();
    let Some(first) = trimmed.chars().next() else {
        return false;
    };
    if first.is_alphabetic() && first.is_lowercase() {
        return true;
    }
    let first_word: String = trimmed
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();
    CONTINUATION_WORDS.contains(&first_word.as_str())
}

/// Merge wrapped sentence fragments. Fenced code regions pass through
/// unmodified.
pub fn merge_continuations(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut in_fence = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if is_fence(line) {
            in_fence = !in_fence;
            out.push(line.to_string());
            i += 1;
            continue;
        }
        if in_fence || !is_plain_text(line) {
            out.push(line.to_string());
            i += 1;
            continue;
        }

        let mut merged = line.trim_end().to_string();
        loop {
            if ends_with_terminal(&merged) {
                break;
            }
            // Look past blank lines for a continuation.
            let mut j = i + 1;
            while j < lines.len() && lines[j].trim().is_empty() {
                j += 1;
            }
            if j >= lines.len()
                || !is_plain_text(lines[j])
                || !is_continuation_start(lines[j])
            {
                break;
            }
            merged.push(' ');
            merged.push_str(lines[j].trim());
            i = j;
        }
        out.push(merged);
        i += 1;
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merges_wrapped_sentence() {
        let input = "The quick brown fox\njumped over the dog.";
        assert_eq!(
            merge_continuations(input),
            "The quick brown fox jumped over the dog."
        );
    }

    #[test]
    fn test_skips_blank_lines_between_fragments() {
        let input = "He walked along\n\nand kept walking.";
        assert_eq!(merge_continuations(input), "He walked along and kept walking.");
    }

    #[test]
    fn test_terminal_punctuation_stops_merge() {
        let input = "A complete sentence.\n\nAnother one here.";
        assert_eq!(merge_continuations(input), input);
    }

    #[test]
    fn test_capitalized_line_not_merged() {
        let input = "First part\nNext sentence starts here.";
        assert_eq!(merge_continuations(input), input);
    }

    #[test]
    fn test_conjunction_start_merges() {
        let input = "It was raining\nBut nobody cared.";
        assert_eq!(merge_continuations(input), "It was raining But nobody cared.");
    }

    #[test]
    fn test_chained_fragments() {
        let input = "one fragment\nand another\nand a third.";
        assert_eq!(
            merge_continuations(input),
            "one fragment and another and a third."
        );
    }

    #[test]
    fn test_fenced_code_untouched() {
        let input = "```\nlet x\ny = x\n```\nafter code\nends here.";
        let merged = merge_continuations(input);
        assert!(merged.contains("```\nlet x\ny = x\n```"));
        assert!(merged.contains("after code ends here."));
    }

    #[test]
    fn test_horizontal_rule_never_merges() {
        let input = "one\n\n---\n\ntwo";
        assert_eq!(merge_continuations(input), input);
    }

    #[test]
    fn test_headings_and_lists_never_merge() {
        let input = "# Heading\n- item one\n- item two";
        assert_eq!(merge_continuations(input), input);
    }
}
