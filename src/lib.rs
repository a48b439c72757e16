//! # glance
//!
//! A document ingestion and normalization library for word-at-a-time
//! (RSVP) reading.
//!
//! Every supported format — EPUB, MOBI/PalmDoc, DOCX, RTF, FictionBook,
//! HTML, Markdown, plain text — is reduced to the same canonical shape: an
//! ordered stream of [`Word`]s with paragraph/page indices, chapter outline
//! entries, and preview markup whose per-word markers line up exactly with
//! the stream.
//!
//! ## Features
//!
//! - One [`Document`] model shared by every format
//! - Chapter outlines and aligned, clickable preview markup
//! - Lenient by default: corrupt chapters degrade to warnings
//! - Structured errors with stable machine-readable categories
//!
//! ## Quick Start
//!
//! ```no_run
//! use glance::{AdapterRegistry, ParseOptions};
//!
//! let registry = AdapterRegistry::with_defaults();
//! let output = registry
//!     .parse_file("book.epub", &ParseOptions::default())
//!     .unwrap();
//!
//! println!("{} words", output.document.total_words());
//! for chapter in &output.chapters {
//!     println!("{} (word {})", chapter.title, chapter.start_word);
//! }
//! ```
//!
//! ## Extending
//!
//! New formats plug in through [`FormatAdapter`]:
//!
//! ```
//! use glance::{AdapterRegistry, FormatAdapter, ParseOptions, ParseOutput};
//!
//! struct MyFormat;
//!
//! impl FormatAdapter for MyFormat {
//!     fn name(&self) -> &'static str { "MyFormat" }
//!     fn extensions(&self) -> &'static [&'static str] { &["myf"] }
//!     fn parse(&self, input: &[u8], options: &ParseOptions) -> glance::Result<ParseOutput> {
//!         todo!()
//!     }
//! }
//!
//! let mut registry = AdapterRegistry::with_defaults();
//! registry.register(Box::new(MyFormat));
//! ```

pub mod document;
pub mod docx;
pub mod epub;
pub mod error;
pub mod fb2;
pub mod html;
pub mod markdown;
pub mod mobi;
pub mod options;
pub mod pagination;
pub mod preview;
pub mod registry;
pub mod rtf;
pub(crate) mod tree;
pub(crate) mod util;
pub mod words;

pub use document::{ChapterEntry, Document, ParseOutput, PreviewUnit, Style, Word};
pub use error::{Error, Result};
pub use options::{ParseOptions, Strictness};
pub use registry::{AdapterRegistry, FormatAdapter, release};
