//! Error types for glance operations.

use thiserror::Error;

/// Errors that can occur while ingesting a document.
///
/// Variants map to the machine-distinguishable failure categories the
/// presentation layer switches on: unsupported format, corrupt container,
/// encrypted content, unsupported compression, empty result.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt container: {0}")]
    CorruptContainer(String),

    #[error("Encrypted content: {0}")]
    EncryptedContent(String),

    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),
}

impl Error {
    /// Short machine-readable category tag, stable across releases.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Zip(_) | Error::CorruptContainer(_) => "corrupt-container",
            Error::Xml(_) => "malformed-markup",
            Error::Utf8(_) => "malformed-text",
            Error::UnsupportedFormat(_) => "unsupported-format",
            Error::EncryptedContent(_) => "encrypted-content",
            Error::UnsupportedCompression(_) => "unsupported-compression",
            Error::EmptyResult(_) => "empty-result",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
