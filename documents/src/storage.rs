//! Document storage and persistence.
//!
//! [`DocumentStore`] is the seam the search service talks to. The bundled
//! [`JsonDocumentStore`] keeps one JSON file per document in a directory,
//! mirrors them in memory, and writes atomically.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::{DocumentError, Result, StorageError};

/// Storage backend for resume documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents, oldest upload first (ties by id).
    async fn list_all(&self) -> Result<Vec<Document>>;

    /// Look up one document.
    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// Add a new document.
    async fn insert(&self, document: Document) -> Result<()>;

    /// Replace the cached vector of an existing document.
    async fn persist_vector(&self, id: &str, embedding: &[f32]) -> Result<()>;
}

/// Directory-backed document store.
///
/// Each document lives in `<root>/<id>.json`.
pub struct JsonDocumentStore {
    /// Root directory for document files.
    root: PathBuf,

    /// In-memory copy of every stored document.
    cache: RwLock<HashMap<String, Document>>,
}

impl JsonDocumentStore {
    /// Open (creating if needed) a store rooted at `root` and load every
    /// document in it. Files that fail to parse or carry an unusable id are
    /// skipped with a warning.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::CreateDirectory(format!("{}: {e}", root.display())))?;

        let store = Self {
            root,
            cache: RwLock::new(HashMap::new()),
        };
        store.load_all().await?;

        Ok(store)
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Whether the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    fn document_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn validate_id(id: &str) -> Result<()> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(DocumentError::InvalidId(id.to_string()))
        }
    }

    async fn load_all(&self) -> Result<()> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::ReadFile(format!("{}: {e}", self.root.display())))?;

        let mut cache = self.cache.write().await;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::ReadFile(format!("{e}")))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match Self::load_file(&path).await {
                    Ok(document) => {
                        debug!("Loaded document: {}", document.id);
                        cache.insert(document.id.clone(), document);
                    }
                    Err(e) => {
                        warn!("Failed to load document {}: {e}", path.display());
                    }
                }
            }
        }

        info!("Loaded {} documents from {}", cache.len(), self.root.display());
        Ok(())
    }

    async fn load_file(path: &Path) -> Result<Document> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StorageError::ReadFile(format!("{}: {e}", path.display())))?;

        let document: Document = serde_json::from_str(&content)?;
        Self::validate_id(&document.id)?;
        Ok(document)
    }

    async fn save_file(&self, document: &Document) -> Result<()> {
        let path = self.document_path(&document.id);
        let content = serde_json::to_string_pretty(document)?;

        // Write atomically using a temp file
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| StorageError::WriteFile(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StorageError::WriteFile(format!("{}: {e}", path.display())))?;

        debug!("Saved document: {}", document.id);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonDocumentStore {
    async fn list_all(&self) -> Result<Vec<Document>> {
        let mut documents: Vec<Document> = self.cache.read().await.values().cloned().collect();
        documents.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(documents)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.cache.read().await.get(id).cloned())
    }

    async fn insert(&self, document: Document) -> Result<()> {
        Self::validate_id(&document.id)?;

        let mut cache = self.cache.write().await;
        if cache.contains_key(&document.id) {
            return Err(DocumentError::AlreadyExists(document.id));
        }

        self.save_file(&document).await?;
        info!("Stored document {} ({})", document.id, document.filename);
        cache.insert(document.id.clone(), document);
        Ok(())
    }

    async fn persist_vector(&self, id: &str, embedding: &[f32]) -> Result<()> {
        let mut cache = self.cache.write().await;
        let current = cache
            .get(id)
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))?;

        let mut updated = current.clone();
        updated.set_embedding(embedding);
        self.save_file(&updated).await?;

        debug!("Persisted {}-dimensional vector for {id}", embedding.len());
        cache.insert(id.to_string(), updated);
        Ok(())
    }
}
