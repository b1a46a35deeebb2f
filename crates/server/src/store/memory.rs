use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::{
    document_id, ensure_id, merge_patch, validate_collection, Document, DocumentStore, Filter,
    Sort, StoreError,
};

/// In-memory document store for tests and ephemeral runs
///
/// Collections are kept in insertion order. Clones share the same
/// underlying state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, Vec<Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.inner.lock().get(collection).map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, mut document: Document) -> Result<String, StoreError> {
        validate_collection(collection)?;
        let id = ensure_id(&mut document);
        self.inner
            .lock()
            .entry(collection.to_string())
            .or_default()
            .push(document);
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
            let inner = self.inner.lock();
            inner
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
        validate_collection(collection)?;
        let mut inner = self.inner.lock();
        let target = inner
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| document_id(d) == Some(id)));
        match target {
            Some(document) => {
                merge_patch(document, patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        validate_collection(collection)?;
        let mut inner = self.inner.lock();
        let Some(docs) = inner.get_mut(collection) else {
            return Ok(false);
        };
        match docs.iter().position(|d| document_id(d) == Some(id)) {
            Some(idx) => {
                docs.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_find_update_delete() {
        let store = MemoryStore::new();

        let a = store.insert_one("posts", doc(json!({"title": "a"}))).await.unwrap();
        let b = store.insert_one("posts", doc(json!({"title": "b"}))).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.count("posts"), 2);

        let all = store.find("posts", &Filter::All, None).await.unwrap();
        assert_eq!(all[0]["title"], "a");
        assert_eq!(all[1]["title"], "b");

        assert!(store.update_one("posts", &a, doc(json!({"title": "a2"}))).await.unwrap());
        let found = store
            .find("posts", &Filter::eq("_id", a.clone()), None)
            .await
            .unwrap();
        assert_eq!(found[0]["title"], "a2");

        assert!(store.delete_one("posts", &b).await.unwrap());
        assert!(!store.delete_one("posts", &b).await.unwrap());
        assert!(!store.update_one("posts", "nope", Document::new()).await.unwrap());
        assert_eq!(store.count("posts"), 1);
    }

    #[tokio::test]
    async fn test_unknown_collection_is_empty() {
        let store = MemoryStore::new();
        let docs = store.find("evaluations", &Filter::All, None).await.unwrap();
        assert!(docs.is_empty());
    }
}
