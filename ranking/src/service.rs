//! Search service: the seam between a front end and the ranking engine.
//!
//! Owns the document store and the engine. A search lists the store, ranks
//! it, and writes every freshly computed vector back, so each search warms
//! the cache for the next one.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use resume_documents::{Candidate, Document, DocumentStore, JsonDocumentStore, extract_text};
use resume_embeddings::{EmbeddingError, ModelProvider, is_blank, normalize};

use crate::config::MatchConfig;
use crate::engine::{CacheUpdate, DegradedEncoding, Match, RankingEngine};
use crate::error::{RankingError, Result};

/// One ranked resume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Document identifier.
    pub id: String,

    /// Uploaded file name.
    pub filename: String,

    /// Candidate details.
    pub candidate: Candidate,

    /// Upload time.
    pub uploaded_at: DateTime<Utc>,

    /// Cosine similarity to the query.
    pub score: f32,
}

impl From<&Match<'_>> for SearchHit {
    fn from(m: &Match<'_>) -> Self {
        Self {
            id: m.document.id.clone(),
            filename: m.document.filename.clone(),
            candidate: m.document.candidate.clone(),
            uploaded_at: m.document.uploaded_at,
            score: m.score,
        }
    }
}

/// Result of a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    /// The query as searched.
    pub query: String,

    /// Ranked hits, best first.
    pub hits: Vec<SearchHit>,

    /// Number of documents considered.
    pub total_documents: usize,

    /// Present when some documents were scored without a vector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<DegradedEncoding>,

    /// Vectors written back to the store.
    pub vectors_persisted: usize,

    /// Vectors that could not be written back.
    pub persist_failures: usize,
}

impl SearchReport {
    /// Whether some documents were scored without a vector.
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Resume search and ingestion over a document store.
pub struct SearchService {
    store: Arc<dyn DocumentStore>,
    engine: RankingEngine,
    config: MatchConfig,
}

impl SearchService {
    /// Open the JSON store under `config.data_dir` and prepare a lazily
    /// loaded model. The model is not built until the first encode.
    pub async fn open(config: MatchConfig) -> Result<Self> {
        let store = JsonDocumentStore::open(&config.data_dir).await?;
        let provider =
            ModelProvider::new(config.embedding.clone()).with_batch_size(config.batch_size);

        info!(
            "Search service ready: {} documents in {}, model {} (batch size {})",
            store.len().await,
            config.data_dir.display(),
            provider.model_name(),
            provider.batch_size()
        );
        Ok(Self::new(Arc::new(store), Arc::new(provider), config))
    }

    /// Assemble a service from existing parts.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<ModelProvider>,
        config: MatchConfig,
    ) -> Self {
        Self {
            store,
            engine: RankingEngine::new(provider),
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// The ranking engine.
    pub fn engine(&self) -> &RankingEngine {
        &self.engine
    }

    /// Rank every stored resume against `query`.
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<SearchReport> {
        if is_blank(query) {
            return Err(RankingError::EmptyQuery);
        }
        let query = query.trim();

        let documents = self.store.list_all().await?;
        let ranking = self.engine.rank(query, &documents, top_k).await?;
        let (vectors_persisted, persist_failures) = self.persist(&ranking.updated).await;

        info!(
            "Search over {} documents returned {} hits ({} vectors cached)",
            documents.len(),
            ranking.matches.len(),
            vectors_persisted
        );

        Ok(SearchReport {
            query: query.to_string(),
            hits: ranking.matches.iter().map(SearchHit::from).collect(),
            total_documents: documents.len(),
            degraded: ranking.degraded,
            vectors_persisted,
            persist_failures,
        })
    }

    /// Store an uploaded resume.
    ///
    /// The vector is computed right away when possible. If encoding fails the
    /// resume is stored without one and the next search fills it in.
    pub async fn ingest(
        &self,
        filename: &str,
        bytes: &[u8],
        candidate: Candidate,
    ) -> Result<Document> {
        let filename = Path::new(filename)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        let kind = self.config.accepts(&filename).ok_or_else(|| {
            RankingError::UnsupportedFileType(filename.clone(), self.config.allowed_extensions())
        })?;
        self.check_size(bytes.len() as u64)?;

        let owned = bytes.to_vec();
        let raw = tokio::task::spawn_blocking(move || extract_text(&owned, kind))
            .await
            .unwrap_or_else(|e| {
                warn!("Text extraction for {filename} did not finish: {e}");
                String::new()
            });
        let text = normalize(&raw);
        let mut document = Document::new(filename, text).with_candidate(candidate);

        match self.encode_one(&document.text_content).await {
            Ok(vector) => document.set_embedding(&vector),
            Err(e) => warn!(
                "Embedding failed for {}, storing it without a vector: {e}",
                document.filename
            ),
        }

        self.store.insert(document.clone()).await?;
        info!(
            "Ingested {} as {} ({} characters, vector: {})",
            document.filename,
            document.id,
            document.text_content.len(),
            document.has_embedding()
        );
        Ok(document)
    }

    /// Store a resume read from disk.
    pub async fn ingest_file(&self, path: &Path, candidate: Candidate) -> Result<Document> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        if self.config.accepts(filename).is_none() {
            return Err(RankingError::UnsupportedFileType(
                filename.to_string(),
                self.config.allowed_extensions(),
            ));
        }
        self.check_size(tokio::fs::metadata(path).await?.len())?;

        let bytes = tokio::fs::read(path).await?;
        self.ingest(filename, &bytes, candidate).await
    }

    /// Look up one stored resume.
    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.store.get(id).await?)
    }

    /// Every stored resume, oldest first.
    pub async fn list(&self) -> Result<Vec<Document>> {
        Ok(self.store.list_all().await?)
    }

    fn check_size(&self, size: u64) -> Result<()> {
        let max = self.config.max_upload_bytes;
        if size > max {
            return Err(RankingError::FileTooLarge { size, max });
        }
        Ok(())
    }

    async fn encode_one(&self, text: &str) -> resume_embeddings::Result<Vec<f32>> {
        let texts = [text.to_string()];
        self.engine
            .provider()
            .encode(&texts, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no vector returned".to_string()))
    }

    /// Write back computed vectors. Returns (written, failed).
    async fn persist(&self, updates: &[CacheUpdate<'_>]) -> (usize, usize) {
        let mut written = 0;
        let mut failed = 0;
        for update in updates {
            match self
                .store
                .persist_vector(&update.document.id, &update.embedding)
                .await
            {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!("Could not persist vector for {}: {e}", update.document.id);
                    failed += 1;
                }
            }
        }
        if written > 0 {
            debug!("Persisted {written} vectors");
        }
        (written, failed)
    }
}
