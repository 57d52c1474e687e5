//! Configuration for resume matching.
//!
//! Read once at process start. [`MatchConfig::from_env`] maps environment
//! variables onto the defaults below; [`MatchConfig::from_lookup`] does the
//! same from any key-value source.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use resume_documents::DocumentKind;
use resume_embeddings::{DEFAULT_BATCH_SIZE, EncoderBackend, EncoderSettings};

use crate::error::{RankingError, Result};

/// Model used with the HTTP backend when none is named.
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

/// Default upload limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Configuration for the search service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Directory holding the document store.
    pub data_dir: PathBuf,

    /// Embedding model configuration.
    pub embedding: EncoderSettings,

    /// Texts per model invocation.
    pub batch_size: usize,

    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: u64,

    /// Accepted upload formats.
    pub allowed_kinds: Vec<DocumentKind>,
}

impl MatchConfig {
    /// Create a configuration with default values and the given data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            embedding: EncoderSettings::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_kinds: DocumentKind::ALL.to_vec(),
        }
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, embedding: EncoderSettings) -> Self {
        self.embedding = embedding;
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the upload size limit.
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from a key lookup.
    ///
    /// Recognized keys: `RESUME_DATA_DIR`, `EMBEDDING_BACKEND`,
    /// `EMBEDDING_MODEL_NAME`, `EMBEDDING_BATCH_SIZE`, `MODEL_CACHE_DIR`,
    /// `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `MAX_CONTENT_LENGTH`,
    /// `ALLOWED_EXTENSIONS`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut config = match get("RESUME_DATA_DIR") {
            Some(dir) => Self::new(dir),
            None => Self::default(),
        };

        if let Some(backend) = get("EMBEDDING_BACKEND") {
            config.embedding.backend = backend
                .parse::<EncoderBackend>()
                .map_err(RankingError::Config)?;
        }
        match get("EMBEDDING_MODEL_NAME") {
            Some(model) => config.embedding.model = model.trim().to_string(),
            None if config.embedding.backend == EncoderBackend::OpenAi => {
                config.embedding.model = DEFAULT_OPENAI_MODEL.to_string();
            }
            None => {}
        }
        config.embedding.cache_dir = get("MODEL_CACHE_DIR").map(PathBuf::from);
        config.embedding.api_key = get("OPENAI_API_KEY");
        if let Some(url) = get("OPENAI_BASE_URL") {
            config.embedding.base_url = url;
        }

        if let Some(batch_size) = get("EMBEDDING_BATCH_SIZE") {
            let batch_size: usize = parse_number("EMBEDDING_BATCH_SIZE", &batch_size)?;
            if batch_size == 0 {
                return Err(RankingError::Config(
                    "EMBEDDING_BATCH_SIZE must be at least 1".to_string(),
                ));
            }
            config.batch_size = batch_size;
        }
        if let Some(max) = get("MAX_CONTENT_LENGTH") {
            config.max_upload_bytes = parse_number("MAX_CONTENT_LENGTH", &max)?;
        }
        if let Some(extensions) = get("ALLOWED_EXTENSIONS") {
            config.allowed_kinds = parse_extensions(&extensions)?;
        }

        Ok(config)
    }

    /// The accepted kind for `filename`, if its extension is allowed.
    pub fn accepts(&self, filename: &str) -> Option<DocumentKind> {
        DocumentKind::from_filename(filename).filter(|kind| self.allowed_kinds.contains(kind))
    }

    /// Accepted extensions, for messages.
    pub fn allowed_extensions(&self) -> String {
        self.allowed_kinds
            .iter()
            .map(|kind| kind.extension())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self::new(dirs::data_dir().unwrap_or_default().join("resume-match/resumes"))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        RankingError::Config(format!(
            "{key} must be a non-negative integer, got {value:?}"
        ))
    })
}

fn parse_extensions(value: &str) -> Result<Vec<DocumentKind>> {
    let mut kinds = Vec::new();
    for extension in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let extension = extension.trim_start_matches('.');
        let kind = DocumentKind::from_extension(extension).ok_or_else(|| {
            RankingError::Config(format!(
                "cannot extract text from .{extension} files (supported: pdf, docx)"
            ))
        })?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(RankingError::Config(
            "ALLOWED_EXTENSIONS must name at least one type".to_string(),
        ));
    }
    Ok(kinds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tokio_test::assert_err;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MatchConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.embedding.backend, EncoderBackend::Local);
        assert_eq!(config.embedding.model, "all-MiniLM-L6-v2");
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.allowed_kinds, vec![DocumentKind::Pdf, DocumentKind::Docx]);
    }

    #[test]
    fn test_overrides() {
        let config = MatchConfig::from_lookup(lookup(&[
            ("RESUME_DATA_DIR", "/tmp/resumes"),
            ("EMBEDDING_BACKEND", "openai"),
            ("EMBEDDING_MODEL_NAME", "text-embedding-3-small"),
            ("OPENAI_API_KEY", "sk-test"),
            ("EMBEDDING_BATCH_SIZE", "8"),
            ("MAX_CONTENT_LENGTH", "1024"),
            ("ALLOWED_EXTENSIONS", "PDF"),
            ("MODEL_CACHE_DIR", ""),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/resumes"));
        assert_eq!(config.embedding.backend, EncoderBackend::OpenAi);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.embedding.cache_dir, None);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.allowed_kinds, vec![DocumentKind::Pdf]);
    }

    #[test]
    fn test_openai_default_model() {
        let config = MatchConfig::from_lookup(lookup(&[("EMBEDDING_BACKEND", "OpenAI")])).unwrap();
        assert_eq!(config.embedding.model, DEFAULT_OPENAI_MODEL);
        assert_eq!(config.embedding.api_key, None);
    }

    #[test]
    fn test_invalid_values() {
        assert_err!(MatchConfig::from_lookup(lookup(&[("MAX_CONTENT_LENGTH", "ten")])));
        assert_err!(MatchConfig::from_lookup(lookup(&[("EMBEDDING_BATCH_SIZE", "0")])));
        assert_err!(MatchConfig::from_lookup(lookup(&[("EMBEDDING_BACKEND", "tfidf")])));
        assert_err!(MatchConfig::from_lookup(lookup(&[("ALLOWED_EXTENSIONS", "pdf,txt")])));
    }

    #[test]
    fn test_accepts() {
        let config = MatchConfig::new("/tmp");
        assert_eq!(config.accepts("cv.pdf"), Some(DocumentKind::Pdf));
        assert_eq!(config.accepts("cv.DOCX"), Some(DocumentKind::Docx));
        assert_eq!(config.accepts("cv.txt"), None);
        assert_eq!(config.allowed_extensions(), "pdf, docx");
    }
}
