//! Error types for ranking and search.

use thiserror::Error;

use resume_documents::DocumentError;
use resume_embeddings::EmbeddingError;

/// Result type alias for ranking operations.
pub type Result<T> = std::result::Result<T, RankingError>;

/// Errors that can occur while ranking, searching or ingesting.
#[derive(Error, Debug)]
pub enum RankingError {
    /// The query could not be embedded, so no meaningful ranking exists.
    #[error("search temporarily unavailable: {0}")]
    SearchUnavailable(#[source] EmbeddingError),

    /// A search was requested without a query.
    #[error("provide a job description or keywords to search for")]
    EmptyQuery,

    /// Uploaded file has an extension that is not accepted.
    #[error("file type not allowed: {0} (accepted: {1})")]
    UnsupportedFileType(String, String),

    /// Uploaded file exceeds the configured size limit.
    #[error("file too large: {size} bytes, max {max}")]
    FileTooLarge { size: u64, max: u64 },

    /// Embedding error outside the query step.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Document store error.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RankingError {
    /// Whether the caller should report "search temporarily unavailable".
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::SearchUnavailable(_))
    }
}
