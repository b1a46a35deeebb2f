//! JSON file document store
//!
//! Each collection lives in `<dir>/<collection>.json` as a JSON array.
//! Collections are loaded into memory at startup and every mutation is
//! written to a temp file and renamed over the original, so a crash never
//! leaves a half-written collection behind. The in-memory copy is only
//! replaced after the file write succeeds.
//!
//! The write and the in-memory publish run on their own task, so a caller
//! that stops waiting (a timeout, a dropped request) cannot leave the file
//! and the in-memory copy disagreeing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{
    document_id, ensure_id, merge_patch, validate_collection, Document, DocumentStore, Filter,
    Sort, StoreError,
};

pub struct JsonDocumentStore {
    inner: Arc<Inner>,
}

struct Inner {
    dir: PathBuf,
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl JsonDocumentStore {
    /// Open (or create) a store rooted at `dir`
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let collections = load_existing_collections(&dir).await?;
        info!(
            "JSON document store initialized at {:?} with {} collections",
            dir,
            collections.len()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                dir,
                collections: RwLock::new(collections),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    async fn contains(&self, collection: &str, id: &str) -> bool {
        let collections = self.inner.collections.read().await;
        collections
            .get(collection)
            .is_some_and(|docs| docs.iter().any(|d| document_id(d) == Some(id)))
    }

    /// Apply `mutate` to a copy of the collection, persist it, then publish it.
    ///
    /// Runs to completion on a spawned task even if the returned future is
    /// dropped.
    async fn mutate<F, R>(&self, collection: &str, mutate: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Vec<Document>) -> R + Send + 'static,
        R: Send + 'static,
    {
        validate_collection(collection)?;
        let inner = self.inner.clone();
        let collection = collection.to_string();

        tokio::spawn(async move {
            let mut collections = inner.collections.write().await;

            let mut updated = collections.get(&collection).cloned().unwrap_or_default();
            let result = mutate(&mut updated);

            inner.save_collection(&collection, &updated).await?;
            collections.insert(collection, updated);

            Ok(result)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store write task failed: {}", e)))?
    }
}

impl Inner {
    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{}.json", collection))
    }

    /// Write a collection to disk atomically
    async fn save_collection(&self, collection: &str, documents: &[Document]) -> Result<(), StoreError> {
        let path = self.collection_path(collection);
        let temp_path = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(documents)?;
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &path).await?;

        debug!("Saved collection {} ({} documents)", collection, documents.len());
        Ok(())
    }
}

async fn load_existing_collections(dir: &Path) -> Result<HashMap<String, Vec<Document>>, StoreError> {
    let mut collections = HashMap::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if validate_collection(name).is_err() {
            warn!("Skipping file with invalid collection name: {:?}", path);
            continue;
        }

        let content = fs::read_to_string(&path).await?;
        match serde_json::from_str::<Vec<Document>>(&content) {
            Ok(documents) => {
                collections.insert(name.to_string(), documents);
            }
            Err(e) => {
                warn!("Failed to load collection from {:?}: {}", path, e);
            }
        }
    }

    Ok(collections)
}

#[async_trait]
impl DocumentStore for JsonDocumentStore {
    async fn insert_one(&self, collection: &str, mut document: Document) -> Result<String, StoreError> {
        let id = ensure_id(&mut document);
        self.mutate(collection, move |docs| docs.push(document)).await?;
        Ok(id)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&Sort>,
    ) -> Result<Vec<Document>, StoreError> {
        validate_collection(collection)?;
        let mut documents: Vec<Document> = {
            let collections = self.inner.collections.read().await;
            collections
                .get(collection)
                .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
                .unwrap_or_default()
        };
        if let Some(sort) = sort {
            sort.apply(&mut documents);
        }
        Ok(documents)
    }

    async fn update_one(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<bool, StoreError> {
        if !self.contains(collection, id).await {
            return Ok(false);
        }

        let id = id.to_string();
        self.mutate(collection, move |docs| {
            match docs.iter_mut().find(|d| document_id(d) == Some(id.as_str())) {
                Some(document) => {
                    merge_patch(document, patch);
                    true
                }
                None => false,
            }
        })
        .await
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        if !self.contains(collection, id).await {
            return Ok(false);
        }

        let id = id.to_string();
        self.mutate(collection, move |docs| {
            let before = docs.len();
            docs.retain(|d| document_id(d) != Some(id.as_str()));
            docs.len() != before
        })
        .await
    }
}
