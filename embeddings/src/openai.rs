//! OpenAI-compatible HTTP embedding backend.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::{TextEncoder, finish_batch};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Encoder that calls an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEncoder {
    /// API key.
    api_key: String,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model requested from the API.
    model: String,

    /// Vector width, fixed by configuration or by the first response.
    /// Zero while unknown.
    dimension: AtomicUsize,
}

impl OpenAiEncoder {
    /// Create an encoder. A missing API key makes the model unavailable.
    pub fn new(model: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let model = model.into();
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| EmbeddingError::unavailable(&model, "OPENAI_API_KEY is not set"))?;

        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            dimension: AtomicUsize::new(known_dimension(&model)),
            model,
        })
    }

    /// Declare the vector width instead of relying on the model name.
    pub fn with_dimension(self, dimension: usize) -> Self {
        self.dimension.store(dimension, Ordering::Relaxed);
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    async fn encode_chunk(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        // The API rejects empty inputs; a single space embeds to the same
        // "no content" direction.
        let input: Vec<&str> = texts
            .iter()
            .map(|t| if t.is_empty() { " " } else { t.as_str() })
            .collect();

        let body = serde_json::json!({
            "input": input,
            "model": self.model,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "{status}: {error_text}"
            )));
        }

        let mut result: EmbeddingsResponse = response.json().await?;
        result.data.sort_by_key(|item| item.index);

        Ok(result.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl TextEncoder for OpenAiEncoder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }

    async fn encode(&self, texts: &[String], batch_size: usize) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Requesting {} embeddings from {} with model {}",
            texts.len(),
            self.base_url,
            self.model
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch_size.max(1)) {
            let rows = self.encode_chunk(chunk).await?;
            if rows.len() != chunk.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    chunk.len(),
                    rows.len()
                )));
            }
            embeddings.extend(rows);
        }

        let dimension = embeddings.first().map_or(0, Vec::len);
        info!("Received {} embeddings ({dimension} dimensions)", embeddings.len());
        let embeddings = finish_batch(embeddings, texts.len(), dimension)?;

        let previous = self.dimension.swap(dimension, Ordering::Relaxed);
        if previous != 0 && previous != dimension {
            warn!(
                "Model {} returned {dimension}-dimensional vectors, expected {previous}",
                self.model
            );
        }
        Ok(embeddings)
    }
}

/// Published widths of the hosted OpenAI models. Other models report 0
/// until their first response.
fn known_dimension(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
        _ => 0,
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn encoder(server: &MockServer) -> OpenAiEncoder {
        OpenAiEncoder::new("text-embedding-3-small", Some("test-key".to_string()))
            .unwrap()
            .with_base_url(server.uri())
    }

    #[test]
    fn test_missing_api_key_is_unavailable() {
        let err = OpenAiEncoder::new("text-embedding-3-small", None).err().unwrap();
        assert!(err.is_model_unavailable());
        let err = OpenAiEncoder::new("text-embedding-3-small", Some("  ".into()))
            .err()
            .unwrap();
        assert!(err.is_model_unavailable());
    }

    #[tokio::test]
    async fn test_encode_orders_by_index_and_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"embedding": [0.0, 2.0], "index": 1},
                    {"embedding": [3.0, 4.0], "index": 0}
                ],
                "model": "text-embedding-3-small"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let texts = vec!["first".to_string(), String::new()];
        let embeddings = encoder(&server).encode(&texts, 32).await.unwrap();

        assert_eq!(embeddings.len(), 2);
        assert!((embeddings[0][0] - 0.6).abs() < 1e-6);
        assert!((embeddings[0][1] - 0.8).abs() < 1e-6);
        assert_eq!(embeddings[1], vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_dimension_follows_the_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [1.0, 2.0, 2.0], "index": 0}],
                "model": "nomic-embed-text"
            })))
            .mount(&server)
            .await;

        let custom = OpenAiEncoder::new("nomic-embed-text", Some("test-key".to_string()))
            .unwrap()
            .with_base_url(server.uri());
        assert_eq!(custom.dimension(), 0);

        custom.encode(&["a".to_string()], 8).await.unwrap();
        assert_eq!(custom.dimension(), 3);

        // A hosted model name is only a first guess.
        let hosted = encoder(&server);
        assert_eq!(hosted.dimension(), 1536);
        hosted.encode(&["a".to_string()], 8).await.unwrap();
        assert_eq!(hosted.dimension(), 3);
    }

    #[test]
    fn test_configured_dimension() {
        let encoder = OpenAiEncoder::new("custom", Some("key".to_string()))
            .unwrap()
            .with_dimension(768);
        assert_eq!(encoder.dimension(), 768);
        assert_eq!(known_dimension("text-embedding-3-large"), 3072);
    }

    #[tokio::test]
    async fn test_encode_splits_into_batches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [1.0, 0.0], "index": 0}],
                "model": "text-embedding-3-small"
            })))
            .expect(3)
            .mount(&server)
            .await;

        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let embeddings = encoder(&server).encode(&texts, 1).await.unwrap();
        assert_eq!(embeddings.len(), 3);
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let err = encoder(&server)
            .encode(&["a".to_string()], 8)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            EmbeddingError::RateLimited {
                retry_after_secs: 7
            }
        ));
    }

    #[tokio::test]
    async fn test_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = encoder(&server)
            .encode(&["a".to_string()], 8)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, EmbeddingError::ApiRequest(msg) if msg.contains("boom")));
    }
}
