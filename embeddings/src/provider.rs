//! Text encoders.
//!
//! A [`TextEncoder`] turns a batch of texts into unit-normalized vectors of a
//! fixed dimension. Implementations live in [`crate::local`],
//! [`crate::openai`] and [`crate::hashing`].

use async_trait::async_trait;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::normalize;

/// Trait for loaded text-to-vector models.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Name of the model this encoder runs.
    fn model_name(&self) -> &str;

    /// Output dimension, or 0 while it is not yet known.
    fn dimension(&self) -> usize;

    /// Encode `texts` into one unit-normalized vector per input, in order.
    ///
    /// `batch_size` bounds how many texts go through the model at once; it
    /// never changes the result. Empty strings still produce a vector.
    async fn encode(&self, texts: &[String], batch_size: usize) -> Result<Vec<Embedding>>;
}

/// Check a raw model output against the request and normalize every row.
///
/// Shared by the encoders so the "one unit vector of dimension `D` per input"
/// contract is enforced in one place.
pub(crate) fn finish_batch(
    mut embeddings: Vec<Embedding>,
    expected_rows: usize,
    dimension: usize,
) -> Result<Vec<Embedding>> {
    if embeddings.len() != expected_rows {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {expected_rows} embeddings, got {}",
            embeddings.len()
        )));
    }

    for embedding in &mut embeddings {
        if embedding.len() != dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: embedding.len(),
            });
        }
        normalize(embedding);
    }

    Ok(embeddings)
}
