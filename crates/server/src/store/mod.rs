//! Document storage
//!
//! A small document-store abstraction standing in for a Mongo-style
//! database: collections of JSON objects with insert/find/update/delete.
//!
//! - [`JsonDocumentStore`]: one JSON file per collection, atomic writes
//! - [`MemoryStore`]: in-process store for tests and ephemeral runs
//! - [`ChaoticStore`]: fault-injecting wrapper for failure testing
//!
//! Handlers work through [`Collection`], a typed view that serializes
//! records and bounds every call with a timeout.

pub mod chaotic;
pub mod json_store;
pub mod memory;

pub use chaotic::ChaoticStore;
pub use json_store::JsonDocumentStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// A stored document: a JSON object
pub type Document = Map<String, Value>;

/// Field holding the store-assigned document id.
pub const ID_FIELD: &str = "_id";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid collection name `{0}`")]
    InvalidCollection(String),

    #[error("invalid blob key `{0}`")]
    InvalidKey(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Document filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document
    All,
    /// Field equals value
    Eq(String, Value),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => document.get(field) == Some(value),
            Filter::And(filters) => filters.iter().all(|f| f.matches(document)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(document)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Sort specification for `find`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Descending,
        }
    }

    /// Stable-sort documents in place.
    pub fn apply(&self, documents: &mut [Document]) {
        documents.sort_by(|a, b| {
            let ord = compare_fields(a.get(&self.field), b.get(&self.field));
            match self.order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });
    }
}

/// Missing fields sort first. RFC 3339 strings compare as instants.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_values(a, b),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::<FixedOffset>::parse_from_rfc3339(x),
                DateTime::<FixedOffset>::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Reject collection names that could escape the storage directory.
pub fn validate_collection(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}

/// Return the document's id, assigning a fresh UUID if it has none.
pub fn ensure_id(document: &mut Document) -> String {
    if let Some(Value::String(id)) = document.get(ID_FIELD) {
        if !id.is_empty() {
            return id.clone();
        }
    }
    let id = Uuid::new_v4().to_string();
    document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
    id
}

/// Shallow-merge `patch` into `document`. The id field is never overwritten.
pub fn merge_patch(document: &mut Document, patch: Document) {
    for (key, value) in patch {
        if key != ID_FIELD {
            document.insert(key, value);
        }
    }
}

/// Document id of a stored document, if any
pub fn document_id(document: &Document) -> Option<&str> {
    document.get(ID_FIELD).and_then(Value::as_str)
}

/// Generic document store.
///
/// Implementations must be safe to share across tasks; all handlers and
/// the delivery router hold the same instance behind an `Arc`.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Insert a document, returning its id.
    ///
    /// A missing `_id` is assigned by the store.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<String, StoreError>;

    /// Documents matching `filter`, in insertion order unless `sort` is given.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&Sort>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Shallow-merge `patch` into the document with `id`. `false` if not found.
    async fn update_one(&self, collection: &str, id: &str, patch: Document)
        -> Result<bool, StoreError>;

    /// Delete the document with `id`. `false` if not found.
    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Typed view of one collection.
pub struct Collection<T> {
    store: Arc<dyn DocumentStore>,
    name: &'static str,
    timeout: Duration,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            name: self.name,
            timeout: self.timeout,
            _record: PhantomData,
        }
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn DocumentStore>, name: &'static str) -> Self {
        Self {
            store,
            name,
            timeout: DEFAULT_STORE_TIMEOUT,
            _record: PhantomData,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    async fn bounded<F, R>(&self, fut: F) -> Result<R, StoreError>
    where
        F: std::future::Future<Output = Result<R, StoreError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }

    /// Insert a record, returning the assigned id.
    pub async fn insert(&self, record: &T) -> Result<String, StoreError> {
        let document = match serde_json::to_value(record)? {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Unavailable(format!(
                    "record for `{}` is not a JSON object: {}",
                    self.name, other
                )))
            }
        };
        self.bounded(self.store.insert_one(self.name, document)).await
    }

    pub async fn find(&self, filter: &Filter, sort: Option<&Sort>) -> Result<Vec<T>, StoreError> {
        let documents = self.bounded(self.store.find(self.name, filter, sort)).await?;
        documents
            .into_iter()
            .map(|doc| serde_json::from_value(Value::Object(doc)).map_err(StoreError::from))
            .collect()
    }

    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.bounded(self.store.delete_one(self.name, id)).await
    }
}
