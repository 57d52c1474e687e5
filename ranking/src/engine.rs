//! The ranking engine.
//!
//! Given a query and a slice of documents, [`RankingEngine::rank`] encodes
//! the query, reuses every valid cached vector, encodes all remaining
//! documents in one batch, and orders the documents by cosine similarity.
//! The engine never writes to a store. Newly computed vectors come back in
//! [`Ranking::updated`] for the caller to persist.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Instant;

use ordered_float::OrderedFloat;
use serde::Serialize;
use tracing::{debug, warn};

use resume_documents::Document;
use resume_embeddings::similarity::unit;
use resume_embeddings::{Embedding, EmbeddingError, ModelProvider, normalize, score_rows};

use crate::error::{RankingError, Result};

/// A document and its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Match<'a> {
    /// The ranked document.
    pub document: &'a Document,

    /// Cosine similarity in [-1, 1].
    pub score: f32,
}

/// A vector computed during ranking that is not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheUpdate<'a> {
    /// The document the vector belongs to.
    pub document: &'a Document,

    /// Unit-normalized embedding of the document's text.
    pub embedding: Embedding,
}

/// Set when the batch encode for uncached documents failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegradedEncoding {
    /// Number of documents scored with a zero vector.
    pub documents: usize,

    /// Why the batch failed.
    pub reason: String,
}

/// Outcome of one ranking call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking<'a> {
    /// Documents ordered by descending score, input order on ties.
    pub matches: Vec<Match<'a>>,

    /// Freshly computed vectors to write back.
    pub updated: Vec<CacheUpdate<'a>>,

    /// Present when some documents could not be encoded.
    pub degraded: Option<DegradedEncoding>,
}

impl Ranking<'_> {
    /// Whether any document was scored with a zero vector.
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Why a stored vector was not used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheMiss {
    Absent,
    Undecodable,
    WrongDimension(usize),
    Degenerate,
}

/// Semantic ranking over a shared embedding model.
#[derive(Clone)]
pub struct RankingEngine {
    provider: Arc<ModelProvider>,
}

impl RankingEngine {
    /// Create an engine backed by `provider`.
    pub fn new(provider: Arc<ModelProvider>) -> Self {
        Self { provider }
    }

    /// The embedding provider.
    pub fn provider(&self) -> &Arc<ModelProvider> {
        &self.provider
    }

    /// Rank `documents` against `query`.
    ///
    /// Fails only when the query itself cannot be encoded
    /// ([`RankingError::SearchUnavailable`]). A failed batch encode for
    /// uncached documents scores them with zero vectors and sets
    /// [`Ranking::degraded`]. `top_k` of `None` or `Some(0)` returns every
    /// document.
    pub async fn rank<'a>(
        &self,
        query: &str,
        documents: &'a [Document],
        top_k: Option<usize>,
    ) -> Result<Ranking<'a>> {
        let started = Instant::now();

        let query_vector = self.encode_query(query).await?;
        let dimension = query_vector.len();

        let mut vectors: Vec<Option<Embedding>> = Vec::with_capacity(documents.len());
        let mut missing: Vec<usize> = Vec::new();
        for (index, document) in documents.iter().enumerate() {
            match cached_vector(document, dimension) {
                Ok(vector) => vectors.push(Some(vector)),
                Err(miss) => {
                    if miss != CacheMiss::Absent {
                        warn!("Ignoring cached vector for {}: {miss:?}", document.id);
                    }
                    vectors.push(None);
                    missing.push(index);
                }
            }
        }

        let mut updated = Vec::with_capacity(missing.len());
        let mut degraded = None;
        if !missing.is_empty() {
            let texts: Vec<String> = missing
                .iter()
                .map(|&index| normalize(&documents[index].text_content))
                .collect();

            let batch = self
                .provider
                .encode_default(&texts)
                .await
                .and_then(|rows| check_batch(rows, texts.len(), dimension));

            match batch {
                Ok(rows) => {
                    for (&index, row) in missing.iter().zip(rows) {
                        vectors[index] = Some(row.clone());
                        updated.push(CacheUpdate {
                            document: &documents[index],
                            embedding: row,
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        "Failed to encode {} uncached documents, scoring them as zero: {e}",
                        missing.len()
                    );
                    degraded = Some(DegradedEncoding {
                        documents: missing.len(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let matrix: Vec<Embedding> = vectors
            .into_iter()
            .map(|vector| vector.unwrap_or_else(|| vec![0.0; dimension]))
            .collect();
        let scores = score_rows(&matrix, &query_vector)?;

        let mut matches: Vec<Match<'a>> = documents
            .iter()
            .zip(scores)
            .map(|(document, score)| Match { document, score })
            .collect();
        matches.sort_by_key(|m| Reverse(OrderedFloat(m.score)));
        if let Some(k) = top_k.filter(|&k| k > 0) {
            matches.truncate(k);
        }

        debug!(
            "Ranked {} documents ({} cached, {} encoded) in {}ms",
            documents.len(),
            documents.len() - missing.len(),
            updated.len(),
            started.elapsed().as_millis()
        );

        Ok(Ranking {
            matches,
            updated,
            degraded,
        })
    }

    async fn encode_query(&self, query: &str) -> Result<Embedding> {
        let text = normalize(query);
        self.provider
            .encode_default(std::slice::from_ref(&text))
            .await
            .and_then(|rows| {
                rows.into_iter().next().ok_or_else(|| {
                    EmbeddingError::InvalidResponse("no vector returned for query".to_string())
                })
            })
            .map_err(RankingError::SearchUnavailable)
    }
}

/// The stored vector of `document`, unit-normalized, if it is usable.
fn cached_vector(
    document: &Document,
    dimension: usize,
) -> std::result::Result<Embedding, CacheMiss> {
    if !document.has_embedding() {
        return Err(CacheMiss::Absent);
    }
    let vector = document.cached_embedding().ok_or(CacheMiss::Undecodable)?;
    if vector.len() != dimension {
        return Err(CacheMiss::WrongDimension(vector.len()));
    }
    unit(&vector).ok_or(CacheMiss::Degenerate)
}

fn check_batch(
    rows: Vec<Embedding>,
    expected: usize,
    dimension: usize,
) -> resume_embeddings::Result<Vec<Embedding>> {
    if rows.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {expected} vectors, got {}",
            rows.len()
        )));
    }
    if let Some(row) = rows.iter().find(|row| row.len() != dimension) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dimension,
            actual: row.len(),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use resume_embeddings::{HashingEncoder, TextEncoder, dot_product};
    use std::sync::Mutex;

    /// Hashing encoder that records batch sizes and can fail from a given call on.
    struct RecordingEncoder {
        inner: HashingEncoder,
        calls: Arc<Mutex<Vec<usize>>>,
        fail_from_call: Option<usize>,
    }

    #[async_trait]
    impl TextEncoder for RecordingEncoder {
        fn model_name(&self) -> &str {
            "recording"
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        async fn encode(
            &self,
            texts: &[String],
            batch_size: usize,
        ) -> resume_embeddings::Result<Vec<Embedding>> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(texts.len());
                calls.len() - 1
            };
            if self.fail_from_call.is_some_and(|n| call >= n) {
                return Err(EmbeddingError::Encode("inference failed".to_string()));
            }
            self.inner.encode(texts, batch_size).await
        }
    }

    fn engine(fail_from_call: Option<usize>) -> (RankingEngine, Arc<Mutex<Vec<usize>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let encoder = RecordingEncoder {
            inner: HashingEncoder::default(),
            calls: Arc::clone(&calls),
            fail_from_call,
        };
        let provider = ModelProvider::from_encoder(encoder);
        (RankingEngine::new(Arc::new(provider)), calls)
    }

    fn ids<'a>(ranking: &Ranking<'a>) -> Vec<&'a str> {
        ranking.matches.iter().map(|m| m.document.id.as_str()).collect()
    }

    fn scenario() -> Vec<Document> {
        vec![
            Document::new("d1.pdf", "senior backend engineer with distributed systems experience")
                .with_id("d1"),
            Document::new("d2.pdf", "pastry chef specializing in French desserts").with_id("d2"),
            Document::new("d3.pdf", "backend engineer, distributed systems, Go and Rust")
                .with_id("d3"),
        ]
    }

    #[tokio::test]
    async fn test_relevant_documents_rank_first() {
        let (engine, calls) = engine(None);
        let documents = scenario();

        let ranking = engine
            .rank("distributed systems backend engineer", &documents, None)
            .await
            .unwrap();

        let order = ids(&ranking);
        assert_eq!(order.len(), 3);
        assert_eq!(order[2], "d2");
        assert!(ranking.matches[1].score > ranking.matches[2].score + 0.2);
        assert_eq!(ranking.updated.len(), 3);
        assert!(!ranking.is_degraded());
        // One call for the query, one batch for the three documents.
        assert_eq!(*calls.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_empty_document_set() {
        let (engine, calls) = engine(None);
        let ranking = engine.rank("anything", &[], None).await.unwrap();

        assert_eq!(ranking, Ranking::default());
        assert_eq!(*calls.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_cached_vectors_are_not_reencoded() {
        let (engine, calls) = engine(None);
        let hashing = HashingEncoder::default();

        let documents = vec![
            Document::new("a.pdf", "rust developer")
                .with_id("a")
                .with_embedding(&hashing.embed_one("rust developer")),
            Document::new("b.pdf", "go developer").with_id("b"),
            Document::new("c.pdf", "python developer")
                .with_id("c")
                .with_embedding(&hashing.embed_one("python developer")),
        ];

        let ranking = engine.rank("rust developer", &documents, None).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![1, 1]);
        assert_eq!(ranking.updated.len(), 1);
        assert_eq!(ranking.updated[0].document.id, "b");
        assert_eq!(ranking.matches[0].document.id, "a");
        assert!((ranking.matches[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_all_cached_skips_batch_call() {
        let (engine, calls) = engine(None);
        let hashing = HashingEncoder::default();
        let documents = vec![
            Document::new("a.pdf", "a")
                .with_id("a")
                .with_embedding(&hashing.embed_one("a")),
        ];

        let ranking = engine.rank("a", &documents, None).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![1]);
        assert!(ranking.updated.is_empty());
    }

    #[tokio::test]
    async fn test_cached_vectors_are_renormalized() {
        let (engine, _) = engine(None);
        let query = HashingEncoder::default().embed_one("rust developer");
        let scaled: Vec<f32> = query.iter().map(|x| x * 7.5).collect();

        let documents = vec![Document::new("a.pdf", "").with_id("a").with_embedding(&scaled)];
        let ranking = engine.rank("rust developer", &documents, None).await.unwrap();

        assert!((ranking.matches[0].score - 1.0).abs() < 1e-5);
        assert!(ranking.updated.is_empty());
    }

    #[tokio::test]
    async fn test_huge_cached_components_are_renormalized() {
        let (engine, calls) = engine(None);
        let query = HashingEncoder::default().embed_one("pastry");
        let scaled: Vec<f32> = query.iter().map(|x| x * 1e20).collect();

        let documents = vec![
            Document::new("a.pdf", "pastry")
                .with_id("a")
                .with_embedding(&scaled),
        ];
        let ranking = engine.rank("pastry", &documents, None).await.unwrap();

        assert!((ranking.matches[0].score - 1.0).abs() < 1e-5);
        assert!(ranking.updated.is_empty());
        assert_eq!(*calls.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_malformed_caches_are_reembedded() {
        let (engine, calls) = engine(None);
        let documents = vec![
            Document::new("a.pdf", "rust")
                .with_id("wrong-dimension")
                .with_embedding(&[0.6, 0.8, 0.0]),
            Document::new("b.pdf", "rust")
                .with_id("garbage")
                .with_embedding_json("not a vector"),
            Document::new("c.pdf", "rust")
                .with_id("zero")
                .with_embedding(&vec![0.0; 256]),
        ];

        let ranking = engine.rank("rust", &documents, None).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![1, 3]);
        let updated: Vec<&str> = ranking
            .updated
            .iter()
            .map(|u| u.document.id.as_str())
            .collect();
        assert_eq!(updated, vec!["wrong-dimension", "garbage", "zero"]);
        assert!(ranking.updated.iter().all(|u| u.embedding.len() == 256));
        assert_eq!(ranking.matches.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_batch_degrades_to_zero_scores() {
        let (engine, _) = engine(Some(1));
        let hashing = HashingEncoder::default();
        let documents = vec![
            Document::new("a.pdf", "pastry chef").with_id("a"),
            Document::new("b.pdf", "rust developer")
                .with_id("b")
                .with_embedding(&hashing.embed_one("rust developer")),
            Document::new("c.pdf", "go developer").with_id("c"),
        ];

        let ranking = engine.rank("rust developer", &documents, None).await.unwrap();

        assert_eq!(ids(&ranking), vec!["b", "a", "c"]);
        assert_eq!(ranking.matches[1].score, 0.0);
        assert_eq!(ranking.matches[2].score, 0.0);
        assert!(ranking.updated.is_empty());
        let degraded = ranking.degraded.unwrap();
        assert_eq!(degraded.documents, 2);
        assert!(degraded.reason.contains("inference failed"));
    }

    #[tokio::test]
    async fn test_query_failure_is_unavailable() {
        let (engine, _) = engine(Some(0));
        let documents = scenario();

        let err = engine.rank("rust", &documents, None).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_ties_keep_input_order_and_are_stable() {
        let (engine, _) = engine(None);
        let documents: Vec<Document> = ["c", "a", "b"]
            .into_iter()
            .map(|id| Document::new("cv.pdf", "same text").with_id(id))
            .collect();

        let first = engine.rank("same text", &documents, None).await.unwrap();
        let second = engine.rank("same text", &documents, None).await.unwrap();

        assert_eq!(ids(&first), vec!["c", "a", "b"]);
        assert_eq!(ids(&first), ids(&second));
    }

    #[tokio::test]
    async fn test_top_k() {
        let (engine, _) = engine(None);
        let documents = scenario();

        let top = engine.rank("backend", &documents, Some(2)).await.unwrap();
        assert_eq!(top.matches.len(), 2);
        // Truncation never drops vectors to persist.
        assert_eq!(top.updated.len(), 3);

        let all = engine.rank("backend", &documents, Some(0)).await.unwrap();
        assert_eq!(all.matches.len(), 3);

        let more = engine.rank("backend", &documents, Some(10)).await.unwrap();
        assert_eq!(more.matches.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_text_documents_participate() {
        let (engine, _) = engine(None);
        let documents = vec![
            Document::new("blank.pdf", "").with_id("blank"),
            Document::new("cv.pdf", "rust").with_id("cv"),
        ];

        let ranking = engine.rank("", &documents, None).await.unwrap();

        assert_eq!(ranking.matches.len(), 2);
        assert_eq!(ranking.updated.len(), 2);
    }

    #[test]
    fn test_check_batch() {
        assert!(check_batch(vec![vec![1.0]], 1, 1).is_ok());
        assert!(matches!(
            check_batch(vec![vec![1.0]], 2, 1),
            Err(EmbeddingError::InvalidResponse(_))
        ));
        assert!(matches!(
            check_batch(vec![vec![1.0, 0.0]], 1, 1),
            Err(EmbeddingError::DimensionMismatch { .. })
        ));
    }

    fn direction() -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-1.0f32..1.0, 256)
            .prop_filter("has a direction", |v| v.iter().any(|x| x.abs() > 1e-3))
    }

    proptest! {
        /// Cached documents come out ordered by their similarity to the
        /// query, with equal scores in input order.
        #[test]
        fn prop_rank_orders_by_similarity(
            directions in prop::collection::vec(direction(), 1..5),
            picks in prop::collection::vec(0usize..5, 1..10),
        ) {
            let (engine, _) = engine(None);
            let query = HashingEncoder::default().embed_one("backend engineer");
            let documents: Vec<Document> = picks
                .iter()
                .enumerate()
                .map(|(i, pick)| {
                    Document::new("cv.pdf", "")
                        .with_id(format!("{i}"))
                        .with_embedding(&directions[pick % directions.len()])
                })
                .collect();

            let ranking =
                tokio_test::block_on(engine.rank("backend engineer", &documents, None)).unwrap();

            prop_assert_eq!(ranking.matches.len(), documents.len());
            prop_assert!(ranking.updated.is_empty());
            for m in &ranking.matches {
                let stored = unit(&m.document.cached_embedding().unwrap()).unwrap();
                let expected = dot_product(&stored, &query).unwrap();
                prop_assert!((m.score - expected).abs() < 1e-5);
            }
            for pair in ranking.matches.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
                if pair[0].score == pair[1].score {
                    let first: usize = pair[0].document.id.parse().unwrap();
                    let second: usize = pair[1].document.id.parse().unwrap();
                    prop_assert!(first < second);
                }
            }
        }
    }
}
