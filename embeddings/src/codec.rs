//! Durable text encoding for embedding vectors.
//!
//! Vectors are stored next to their document as a JSON array of decimal
//! numbers (`[0.12,-0.5,...]`). Decoding is forgiving: anything that is not
//! a well-formed array of finite numbers reads back as "no cached vector".

use itertools::Itertools;
use tracing::debug;

use crate::Embedding;

/// Encode a vector as a JSON array.
///
/// Components are written with the shortest decimal form that parses back
/// to the same `f32`, so finite vectors round-trip exactly.
pub fn encode_vector(vector: &[f32]) -> String {
    format!("[{}]", vector.iter().map(f32::to_string).join(","))
}

/// Decode a stored vector.
///
/// Returns `None` for empty or whitespace-only input, for anything that is
/// not a JSON array of numbers, and for arrays containing values that do not
/// fit in a finite `f32`. The result is not assumed to be normalized.
pub fn decode_vector(stored: &str) -> Option<Embedding> {
    let stored = stored.trim();
    if stored.is_empty() {
        return None;
    }

    let vector: Embedding = match serde_json::from_str(stored) {
        Ok(vector) => vector,
        Err(e) => {
            debug!("Discarding undecodable cached vector: {e}");
            return None;
        }
    };

    if vector.iter().any(|x| !x.is_finite()) {
        debug!("Discarding cached vector with non-finite components");
        return None;
    }

    Some(vector)
}
