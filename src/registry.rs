//! Format adapter contract and registry.
//!
//! Every parser implements [`FormatAdapter`]; the [`AdapterRegistry`] is the
//! sole entry point the rest of the system calls. The registry is a
//! constructed, immutable table — build it once at startup and pass it by
//! reference. First registered match wins, so registration order matters when
//! two adapters could claim the same extension.

use std::path::Path;

use crate::docx::DocxAdapter;
use crate::epub::EpubAdapter;
use crate::error::{Error, Result};
use crate::fb2::Fb2Adapter;
use crate::html::HtmlAdapter;
use crate::markdown::MarkdownAdapter;
use crate::mobi::MobiAdapter;
use crate::options::ParseOptions;
use crate::pagination::merge_short_pages;
use crate::rtf::RtfAdapter;
use crate::ParseOutput;

/// A format-specific parser.
///
/// `parse` returns a complete [`ParseOutput`] or a descriptive [`Error`] —
/// never an unstructured panic. Recoverable per-section problems are recorded
/// as warnings on the output instead of failing the whole document.
pub trait FormatAdapter: Send + Sync {
    /// Short human-readable format name ("EPUB", "Markdown", ...).
    fn name(&self) -> &'static str;

    /// Lowercased file extensions this adapter accepts.
    fn extensions(&self) -> &'static [&'static str];

    /// Lowercased media types this adapter accepts.
    fn media_types(&self) -> &'static [&'static str] {
        &[]
    }

    fn parse(&self, input: &[u8], options: &ParseOptions) -> Result<ParseOutput>;
}

/// Immutable table of registered adapters.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn FormatAdapter>>,
}

impl AdapterRegistry {
    /// An empty registry. Most callers want [`AdapterRegistry::with_defaults`].
    pub fn new() -> Self {
        Self { adapters: Vec::new() }
    }

    /// Registry with every built-in adapter, in resolution order.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(EpubAdapter));
        registry.register(Box::new(MobiAdapter));
        registry.register(Box::new(DocxAdapter));
        registry.register(Box::new(RtfAdapter));
        registry.register(Box::new(Fb2Adapter));
        registry.register(Box::new(HtmlAdapter));
        // Markdown last: it also claims plain text.
        registry.register(Box::new(MarkdownAdapter));
        registry
    }

    pub fn register(&mut self, adapter: Box<dyn FormatAdapter>) {
        self.adapters.push(adapter);
    }

    /// Resolve an adapter by lowercased extension or media type. First match
    /// wins.
    pub fn resolve(
        &self,
        extension: Option<&str>,
        media_type: Option<&str>,
    ) -> Option<&dyn FormatAdapter> {
        let extension = extension.map(|e| e.to_ascii_lowercase());
        let media_type = media_type.map(|m| m.to_ascii_lowercase());
        self.adapters
            .iter()
            .find(|a| {
                extension
                    .as_deref()
                    .is_some_and(|e| a.extensions().contains(&e))
                    || media_type
                        .as_deref()
                        .is_some_and(|m| a.media_types().contains(&m))
            })
            .map(|a| a.as_ref())
    }

    /// Every extension the registry can handle, in registration order.
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        self.adapters
            .iter()
            .flat_map(|a| a.extensions().iter().copied())
            .collect()
    }

    /// Parse raw bytes with the adapter matching `extension`/`media_type`,
    /// then run the page-merge post-processor and degenerate-result check.
    pub fn parse_bytes(
        &self,
        input: &[u8],
        extension: Option<&str>,
        media_type: Option<&str>,
        options: &ParseOptions,
    ) -> Result<ParseOutput> {
        let Some(adapter) = self.resolve(extension, media_type) else {
            return Err(Error::UnsupportedFormat(format!(
                "no adapter for {} (supported: {})",
                extension.or(media_type).unwrap_or("unknown input"),
                self.supported_extensions().join(", ")
            )));
        };

        log::debug!("parsing {} bytes with {} adapter", input.len(), adapter.name());
        let mut output = adapter.parse(input, options)?;

        let mut chapter_starts: Vec<u32> =
            output.chapters.iter().map(|c| c.start_word).collect();
        chapter_starts.dedup();
        merge_short_pages(&mut output.document, &chapter_starts, options.page_min_words);

        if output.document.total_words() == 0 {
            output
                .warnings
                .push(format!("{} parsed successfully but produced no words", adapter.name()));
        }
        Ok(output)
    }

    /// Read and parse a file, resolving the adapter from its extension.
    pub fn parse_file(&self, path: impl AsRef<Path>, options: &ParseOptions) -> Result<ParseOutput> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        let data = std::fs::read(path)?;
        self.parse_bytes(&data, extension.as_deref(), None, options)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Release a loaded document's transient resources.
///
/// Parsing is at-most-one-in-flight by caller convention; when a new load
/// supersedes an old one the caller hands the stale output here. Buffers are
/// plain owned memory, so dropping is sufficient — this exists so the
/// superseding contract has an explicit seam rather than relying on scope.
pub fn release(output: ParseOutput) {
    drop(output);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_by_extension_and_media_type() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.resolve(Some("epub"), None).unwrap().name(), "EPUB");
        assert_eq!(registry.resolve(Some("EPUB"), None).unwrap().name(), "EPUB");
        assert_eq!(
            registry
                .resolve(None, Some("application/x-mobipocket-ebook"))
                .unwrap()
                .name(),
            "MOBI"
        );
        assert!(registry.resolve(Some("xyz"), None).is_none());
    }

    #[test]
    fn test_unsupported_extension_lists_supported() {
        let registry = AdapterRegistry::with_defaults();
        let err = registry
            .parse_bytes(b"data", Some("xyz"), None, &ParseOptions::default())
            .unwrap_err();
        assert_eq!(err.category(), "unsupported-format");
        assert!(err.to_string().contains("epub"));
        assert!(err.to_string().contains("md"));
    }

    #[test]
    fn test_degenerate_result_warns() {
        let registry = AdapterRegistry::with_defaults();
        let output = registry
            .parse_bytes(b"", Some("txt"), None, &ParseOptions::default())
            .unwrap();
        assert_eq!(output.document.total_words(), 0);
        assert!(output.warnings.iter().any(|w| w.contains("no words")));
    }

    #[test]
    fn test_single_word_end_to_end() {
        let registry = AdapterRegistry::with_defaults();
        let output = registry
            .parse_bytes(b"hello", Some("txt"), None, &ParseOptions::default())
            .unwrap();
        assert_eq!(output.document.total_words(), 1);
        assert_eq!(output.document.total_pages(), 1);
        assert!(output.warnings.is_empty());
    }
}
