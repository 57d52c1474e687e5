//! Process-wide embedding model with lazy, single-flight construction.
//!
//! A [`ModelProvider`] owns an [`EncoderLoader`] and builds the encoder the
//! first time it is needed. Concurrent first callers wait for one
//! construction instead of racing; a failed construction is not cached, so
//! the next call tries again. Once built, the handle is shared read-only.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::hashing::{DEFAULT_HASH_DIMENSION, HASHING_MODEL_NAME, HashingEncoder};
use crate::local::LocalEncoder;
use crate::openai::{DEFAULT_BASE_URL, OpenAiEncoder};
use crate::provider::TextEncoder;

/// Shared handle to a loaded model.
pub type ModelHandle = Arc<dyn TextEncoder>;

/// Default model name.
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Default number of texts per model invocation.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Something that can construct an encoder.
#[async_trait]
pub trait EncoderLoader: Send + Sync {
    /// Name of the model this loader builds.
    fn model_name(&self) -> &str;

    /// Construct the encoder. May be slow and may fail.
    async fn load(&self) -> Result<ModelHandle>;
}

/// Which backend runs the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EncoderBackend {
    /// Local ONNX sentence-embedding model.
    #[default]
    Local,
    /// OpenAI-compatible embeddings API.
    #[serde(rename = "openai")]
    OpenAi,
    /// Feature hashing, no model download.
    Hashing,
}

impl std::str::FromStr for EncoderBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "fastembed" => Ok(Self::Local),
            "openai" => Ok(Self::OpenAi),
            "hash" | "hashing" => Ok(Self::Hashing),
            other => Err(format!(
                "unknown embedding backend `{other}` (expected local, openai or hashing)"
            )),
        }
    }
}

/// Everything needed to build the configured encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderSettings {
    /// Backend to use.
    pub backend: EncoderBackend,

    /// Model name passed to the backend.
    pub model: String,

    /// Download directory for local models.
    pub cache_dir: Option<PathBuf>,

    /// API key for the HTTP backend.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL for the HTTP backend.
    pub base_url: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            backend: EncoderBackend::Local,
            model: DEFAULT_MODEL_NAME.to_string(),
            cache_dir: None,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl EncoderLoader for EncoderSettings {
    fn model_name(&self) -> &str {
        match self.backend {
            EncoderBackend::Hashing => HASHING_MODEL_NAME,
            EncoderBackend::Local | EncoderBackend::OpenAi => &self.model,
        }
    }

    async fn load(&self) -> Result<ModelHandle> {
        match self.backend {
            EncoderBackend::Local => {
                let encoder = LocalEncoder::load(&self.model, self.cache_dir.clone()).await?;
                Ok(Arc::new(encoder))
            }
            EncoderBackend::OpenAi => {
                let encoder = OpenAiEncoder::new(&self.model, self.api_key.clone())?
                    .with_base_url(&self.base_url);
                Ok(Arc::new(encoder))
            }
            EncoderBackend::Hashing => Ok(Arc::new(HashingEncoder::new(DEFAULT_HASH_DIMENSION))),
        }
    }
}

/// Loader that hands out an already-built encoder.
struct Preloaded(ModelHandle);

#[async_trait]
impl EncoderLoader for Preloaded {
    fn model_name(&self) -> &str {
        self.0.model_name()
    }

    async fn load(&self) -> Result<ModelHandle> {
        Ok(Arc::clone(&self.0))
    }
}

/// Lazily-initialized, shared embedding model.
pub struct ModelProvider {
    loader: Box<dyn EncoderLoader>,
    model: OnceCell<ModelHandle>,
    batch_size: usize,
}

impl ModelProvider {
    /// Create a provider that builds its model with `loader` on first use.
    pub fn new(loader: impl EncoderLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            model: OnceCell::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Create a provider around an encoder that is already loaded.
    pub fn from_encoder(encoder: impl TextEncoder + 'static) -> Self {
        let handle: ModelHandle = Arc::new(encoder);
        Self {
            loader: Box::new(Preloaded(Arc::clone(&handle))),
            model: OnceCell::new_with(Some(handle)),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the default batch size used by [`ModelProvider::encode_default`].
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Configured model name.
    pub fn model_name(&self) -> &str {
        self.loader.model_name()
    }

    /// Default batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Whether the model has been constructed.
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Return the shared model, constructing it on first call.
    ///
    /// Any construction failure is reported as
    /// [`EmbeddingError::ModelUnavailable`] and leaves the provider empty.
    pub async fn get_model(&self) -> Result<ModelHandle> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let name = self.loader.model_name().to_string();
                info!("Loading embedding model: {name}");
                let started = Instant::now();

                match self.loader.load().await {
                    Ok(model) => {
                        let elapsed = started.elapsed().as_millis();
                        let width = match model.dimension() {
                            0 => String::new(),
                            dimension => format!(" ({dimension} dimensions)"),
                        };
                        info!("Embedding model {name} loaded in {elapsed}ms{width}");
                        Ok(model)
                    }
                    Err(e) => {
                        warn!("Failed to load embedding model {name}: {e}");
                        Err(match e {
                            EmbeddingError::ModelUnavailable { .. } => e,
                            other => EmbeddingError::unavailable(name, other),
                        })
                    }
                }
            })
            .await?;

        Ok(Arc::clone(model))
    }

    /// Encode `texts` with the shared model.
    pub async fn encode(&self, texts: &[String], batch_size: usize) -> Result<Vec<Embedding>> {
        let model = self.get_model().await?;
        model.encode(texts, batch_size.max(1)).await
    }

    /// Encode `texts` with the configured batch size.
    pub async fn encode_default(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.encode(texts, self.batch_size).await
    }
}
