//! Parse-time tunables.

/// How the PalmDoc decompressor treats back-references that point before the
/// start of the decoded output.
///
/// Lenient mode substitutes a zero byte and keeps going, which matches how
/// most desktop readers behave on slightly damaged files. Strict mode fails
/// fast so corrupt input is surfaced instead of silently padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    #[default]
    Lenient,
    Strict,
}

/// Options threaded through every adapter.
///
/// Constructed once by the caller and passed by reference; there is no global
/// configuration.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Decompressor policy for out-of-range back-references.
    pub strictness: Strictness,

    /// Whether the Markdown/plain-text front end repairs paragraphs that were
    /// reflowed from fixed-width sources (lines split mid-sentence). The
    /// heuristics misfire on some legitimate inputs, so this is a policy
    /// switch rather than a fixed law.
    pub merge_continuations: bool,

    /// Target number of words per page when an adapter paginates on word
    /// count rather than document structure.
    pub page_target_words: usize,

    /// Minimum words per page enforced by the page-merge post-processor.
    /// Pages below this are merged into their successors, except across
    /// chapter boundaries.
    pub page_min_words: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strictness: Strictness::Lenient,
            merge_continuations: true,
            page_target_words: 200,
            page_min_words: 50,
        }
    }
}
