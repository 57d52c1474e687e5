//! # Resume Documents
//!
//! Storage and ingestion-side plumbing for resumes:
//!
//! - **Documents**: the stored record, including its cached embedding
//! - **Document Store**: the persistence seam, with a JSON directory backend
//! - **Text Extraction**: PDF and DOCX to plain text, never failing outward

pub mod document;
pub mod error;
pub mod extraction;
pub mod storage;

pub use document::{Candidate, Document};
pub use error::{DocumentError, ExtractionError, Result, StorageError};
pub use extraction::{DocumentKind, extract_file, extract_text};
pub use storage::{DocumentStore, JsonDocumentStore};
