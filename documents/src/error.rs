//! Error types for resume documents.

use thiserror::Error;

/// Result type alias for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Errors that can occur while storing or reading documents.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Document not found.
    #[error("document not found: {0}")]
    NotFound(String),

    /// A document with this id is already stored.
    #[error("document already exists: {0}")]
    AlreadyExists(String),

    /// Identifier cannot be used as a storage key.
    #[error("invalid document id: {0:?}")]
    InvalidId(String),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create storage directory.
    #[error("failed to create directory: {0}")]
    CreateDirectory(String),

    /// Failed to read a document file.
    #[error("failed to read file: {0}")]
    ReadFile(String),

    /// Failed to write a document file.
    #[error("failed to write file: {0}")]
    WriteFile(String),
}

/// Reasons text extraction can fail internally.
///
/// These never escape [`crate::extraction::extract_text`], which logs them
/// and returns an empty string instead.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The PDF could not be parsed.
    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// The DOCX container could not be opened.
    #[error("docx archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The DOCX body could not be parsed.
    #[error("docx markup error: {0}")]
    Markup(String),

    /// The parser panicked on malformed input.
    #[error("parser panicked: {0}")]
    Panicked(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
