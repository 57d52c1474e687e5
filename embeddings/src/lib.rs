//! # Embeddings
//!
//! This crate turns resume and job-description text into unit-length
//! vectors and back into storable strings.
//!
//! ## Features
//!
//! - **Text Normalization**: Canonical single-spaced text before encoding
//! - **Model Provider**: One lazily-loaded model shared by the whole process
//! - **Multiple Backends**: Local ONNX models, OpenAI-compatible APIs, feature hashing
//! - **Vector Codec**: JSON-array encoding for caching vectors next to documents
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  normalize ──► ModelProvider ──► TextEncoder ──► Embedding      │
//! │                     │                               │           │
//! │                     ▼                               ▼           │
//! │        Local / OpenAI / Hashing           codec / similarity    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod error;
pub mod hashing;
pub mod local;
pub mod model;
pub mod openai;
pub mod provider;
pub mod similarity;
pub mod text;

pub use codec::{decode_vector, encode_vector};
pub use error::{EmbeddingError, Result};
pub use hashing::HashingEncoder;
pub use local::LocalEncoder;
pub use model::{
    DEFAULT_BATCH_SIZE, DEFAULT_MODEL_NAME, EncoderBackend, EncoderLoader, EncoderSettings,
    ModelHandle, ModelProvider,
};
pub use openai::OpenAiEncoder;
pub use provider::TextEncoder;
pub use similarity::{dot_product, score_rows};
pub use text::{is_blank, normalize};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
