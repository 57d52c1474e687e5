//! The stored resume record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use resume_embeddings::{Embedding, decode_vector, encode_vector};

/// Who a resume belongs to, as entered at upload time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Candidate display name.
    pub name: Option<String>,

    /// Candidate contact email.
    pub email: Option<String>,
}

impl Candidate {
    /// Create a candidate with a name and email.
    pub fn new(name: Option<String>, email: Option<String>) -> Self {
        Self { name, email }
    }
}

/// A resume as stored.
///
/// `embedding_json` holds the cached vector in its stored form (see
/// [`resume_embeddings::codec`]). It is absent until a vector has been
/// computed, and it is only ever replaced by a freshly computed vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier.
    pub id: String,

    /// Name of the uploaded file.
    pub filename: String,

    /// Candidate the resume belongs to.
    #[serde(default)]
    pub candidate: Candidate,

    /// When the file was ingested.
    pub uploaded_at: DateTime<Utc>,

    /// Normalized plain text extracted from the file.
    #[serde(default)]
    pub text_content: String,

    /// Cached embedding, encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_json: Option<String>,
}

impl Document {
    /// Create a document with a fresh id and the current time.
    pub fn new(filename: impl Into<String>, text_content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            filename: filename.into(),
            candidate: Candidate::default(),
            uploaded_at: Utc::now(),
            text_content: text_content.into(),
            embedding_json: None,
        }
    }

    /// Replace the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the candidate.
    pub fn with_candidate(mut self, candidate: Candidate) -> Self {
        self.candidate = candidate;
        self
    }

    /// Set the upload time.
    pub fn with_uploaded_at(mut self, uploaded_at: DateTime<Utc>) -> Self {
        self.uploaded_at = uploaded_at;
        self
    }

    /// Attach a cached vector.
    pub fn with_embedding(mut self, embedding: &[f32]) -> Self {
        self.set_embedding(embedding);
        self
    }

    /// Attach an already-encoded cached vector, exactly as stored.
    pub fn with_embedding_json(mut self, stored: impl Into<String>) -> Self {
        self.embedding_json = Some(stored.into());
        self
    }

    /// Store `embedding` as this document's cached vector.
    pub fn set_embedding(&mut self, embedding: &[f32]) {
        self.embedding_json = Some(encode_vector(embedding));
    }

    /// Decode the cached vector, if there is a readable one.
    pub fn cached_embedding(&self) -> Option<Embedding> {
        self.embedding_json.as_deref().and_then(decode_vector)
    }

    /// Whether a non-blank cached vector is stored (it may still be unreadable).
    pub fn has_embedding(&self) -> bool {
        self.embedding_json
            .as_deref()
            .is_some_and(|stored| !stored.trim().is_empty())
    }
}
