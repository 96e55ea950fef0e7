//! Error types for the scrub-core library.

use std::time::Duration;

use thiserror::Error;

/// Main error type for the scrub library.
#[derive(Error, Debug)]
pub enum ScrubError {
    /// The document could not be decrypted or unrestricted.
    #[error("unlock error: {0}")]
    Unlock(#[from] UnlockError),

    /// Text could not be read from an unlocked document.
    #[error("extract error: {0}")]
    Extract(#[from] ExtractError),

    /// Invalid field rules or settings.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The aggregate table could not be serialized.
    #[error("export error: {0}")]
    Export(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while removing encryption and permission restrictions.
#[derive(Error, Debug)]
pub enum UnlockError {
    /// The input is not a readable PDF.
    #[error("malformed PDF: {0}")]
    Malformed(String),

    /// The document is encrypted with something we cannot open without a password.
    #[error("unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    /// Re-serializing the unlocked document failed.
    #[error("failed to save unlocked PDF: {0}")]
    Save(String),

    /// The external tool could not be started.
    #[error("failed to launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool exited unsuccessfully.
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// The external tool did not finish in time and was killed.
    #[error("{tool} timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    /// Temporary storage could not be written or read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading text out of an unlocked document.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The buffer is not a valid PDF structure.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The document has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// The text backend decoded a different number of pages than the document declares.
    #[error("decoded {decoded} of {expected} pages")]
    PageCount { expected: usize, decoded: usize },

    /// A page could not be decoded.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The text backend panicked on this document.
    #[error("text extraction panicked (malformed document)")]
    Panicked,
}

/// Errors in the field rule table or other settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A pattern failed to compile.
    #[error("invalid pattern for {field}: {reason}")]
    InvalidPattern { field: String, reason: String },

    /// A pattern does not declare exactly one capture group.
    #[error("pattern for {field} must have exactly one capture group, found {found}")]
    CaptureGroups { field: String, found: usize },

    /// The same field name was declared twice.
    #[error("duplicate field name: {0}")]
    DuplicateField(String),

    /// No fields were declared.
    #[error("field rule set is empty")]
    EmptyRuleSet,

    /// The export delimiter is not a single ASCII byte.
    #[error("invalid delimiter: {0:?}")]
    Delimiter(char),
}

/// Result type for the scrub library.
pub type Result<T> = std::result::Result<T, ScrubError>;
