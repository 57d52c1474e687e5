//! Deterministic feature-hashing encoder.
//!
//! Lowercased alphanumeric tokens are hashed with FNV-1a into a fixed number
//! of buckets, with the sign taken from one hash bit. It captures word
//! overlap only, not meaning, but it needs no model download and gives the
//! same vector for the same text on every machine. Useful offline and in
//! tests.

use async_trait::async_trait;

use crate::Embedding;
use crate::error::Result;
use crate::provider::{TextEncoder, finish_batch};
use crate::similarity::normalize;

/// Model name reported by [`HashingEncoder`].
pub const HASHING_MODEL_NAME: &str = "fnv1a-hashing";

/// Default number of buckets.
pub const DEFAULT_HASH_DIMENSION: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Feature-hashing text encoder.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dimension: usize,
}

impl HashingEncoder {
    /// Create an encoder with `dimension` buckets (at least one).
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Encode a single text.
    pub fn embed_one(&self, text: &str) -> Embedding {
        let mut embedding = vec![0.0f32; self.dimension];

        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty());
        for token in tokens {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        // Texts without tokens (or whose tokens cancel out) share one fixed
        // direction so the output is always unit length.
        if embedding.iter().all(|x| *x == 0.0) {
            embedding[0] = 1.0;
        }

        normalize(&mut embedding);
        embedding
    }
}

impl Default for HashingEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMENSION)
    }
}

#[async_trait]
impl TextEncoder for HashingEncoder {
    fn model_name(&self) -> &str {
        HASHING_MODEL_NAME
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, texts: &[String], _batch_size: usize) -> Result<Vec<Embedding>> {
        let embeddings = texts.iter().map(|text| self.embed_one(text)).collect();
        finish_batch(embeddings, texts.len(), self.dimension)
    }
}
