//! Local sentence-embedding models backed by `fastembed` (ONNX runtime).

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::{TextEncoder, finish_batch};

/// Models that can be selected by name, with their output dimension.
const KNOWN_MODELS: &[(&str, usize)] = &[
    ("all-MiniLM-L6-v2", 384),
    ("all-MiniLM-L12-v2", 384),
    ("bge-small-en-v1.5", 384),
    ("bge-base-en-v1.5", 768),
    ("paraphrase-multilingual-MiniLM-L12-v2", 384),
];

/// Resolve a configured model name to a `fastembed` model and its dimension.
///
/// Accepts the bare name or the `sentence-transformers/` / `BAAI/` prefixed
/// form, case-insensitively.
pub fn resolve_model(name: &str) -> Option<(EmbeddingModel, usize)> {
    let bare = name.rsplit('/').next().unwrap_or(name).to_ascii_lowercase();
    let model = match bare.as_str() {
        "all-minilm-l6-v2" => EmbeddingModel::AllMiniLML6V2,
        "all-minilm-l12-v2" => EmbeddingModel::AllMiniLML12V2,
        "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
        "paraphrase-multilingual-minilm-l12-v2" => EmbeddingModel::ParaphraseMLMiniLML12V2,
        _ => return None,
    };
    let dimension = KNOWN_MODELS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(&bare))
        .map(|(_, dimension)| *dimension)?;
    Some((model, dimension))
}

/// Names accepted by [`resolve_model`].
pub fn known_models() -> impl Iterator<Item = &'static str> {
    KNOWN_MODELS.iter().map(|(name, _)| *name)
}

/// A `fastembed` model loaded into this process.
///
/// The ONNX session needs exclusive access while encoding, so calls are
/// serialized through a mutex and run on the blocking thread pool.
pub struct LocalEncoder {
    name: String,
    dimension: usize,
    model: Arc<Mutex<TextEmbedding>>,
}

impl LocalEncoder {
    /// Load (downloading on first use) the named model.
    pub async fn load(name: &str, cache_dir: Option<PathBuf>) -> Result<Self> {
        let (model, dimension) = resolve_model(name).ok_or_else(|| {
            EmbeddingError::unavailable(
                name,
                format!(
                    "unknown local model; expected one of: {}",
                    known_models().collect::<Vec<_>>().join(", ")
                ),
            )
        })?;

        let mut options = InitOptions::new(model).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let embedding = tokio::task::spawn_blocking(move || TextEmbedding::try_new(options))
            .await
            .map_err(|e| EmbeddingError::unavailable(name, e))?
            .map_err(|e| EmbeddingError::unavailable(name, e))?;

        Ok(Self {
            name: name.to_string(),
            dimension,
            model: Arc::new(Mutex::new(embedding)),
        })
    }
}

#[async_trait]
impl TextEncoder for LocalEncoder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, texts: &[String], batch_size: usize) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Encoding {} texts locally with {} (batch size {batch_size})",
            texts.len(),
            self.name
        );

        let model = Arc::clone(&self.model);
        let batch = texts.to_vec();
        let batch_size = batch_size.max(1);
        let embeddings = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| EmbeddingError::Encode("embedding model lock poisoned".to_string()))?;
            model
                .embed(batch, Some(batch_size))
                .map_err(|e| EmbeddingError::Encode(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::Encode(e.to_string()))??;

        finish_batch(embeddings, texts.len(), self.dimension)
    }
}
