//! Similarity computation for embeddings.
//!
//! Everything here assumes unit-normalized vectors, where the dot product is
//! the cosine similarity. Length mismatches are reported as errors instead
//! of being silently truncated by `zip`.

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Compute the dot product between two embeddings.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Score every row of `matrix` against `query`.
///
/// Fails on the first row whose length differs from the query.
pub fn score_rows(matrix: &[Embedding], query: &[f32]) -> Result<Vec<f32>> {
    matrix.iter().map(|row| dot_product(query, row)).collect()
}

/// Euclidean length of a vector.
pub fn l2_norm(embedding: &[f32]) -> f32 {
    wide_norm(embedding) as f32
}

/// Length accumulated in `f64`, so components near `f32::MAX` do not
/// overflow the sum of squares.
fn wide_norm(embedding: &[f32]) -> f64 {
    embedding
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}

/// Normalize an embedding to unit length.
///
/// Zero vectors are left unchanged.
pub fn normalize(embedding: &mut Embedding) {
    let magnitude = wide_norm(embedding);
    if magnitude > 0.0 && magnitude.is_finite() {
        for x in embedding.iter_mut() {
            *x = (f64::from(*x) / magnitude) as f32;
        }
    }
}

/// Return a unit-length copy of `embedding`, or `None` when it has no
/// direction (zero or non-finite length).
pub fn unit(embedding: &[f32]) -> Option<Embedding> {
    let magnitude = wide_norm(embedding);
    if magnitude == 0.0 || !magnitude.is_finite() {
        return None;
    }
    Some(
        embedding
            .iter()
            .map(|&x| (f64::from(x) / magnitude) as f32)
            .collect(),
    )
}
