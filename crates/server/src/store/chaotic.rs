//! Fault-injecting document store
//!
//! Wraps another store and fails operations at a configured rate, with
//! optional added latency. Used to exercise persistence-failure and
//! timeout paths.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{Document, DocumentStore, Filter, Sort, StoreError};

/// Deterministic LCG so failure sequences are reproducible for a seed
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

#[derive(Clone)]
pub struct ChaoticStore<S> {
    inner: S,
    /// 0.0 never fails, 1.0 always fails
    failure_rate: f64,
    latency: Option<Duration>,
    rng: Arc<Mutex<ChaoticRng>>,
    operations: Arc<AtomicUsize>,
}

impl<S: DocumentStore> ChaoticStore<S> {
    /// `failure_rate` is clamped to [0.0, 1.0].
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        Self {
            inner,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            latency: None,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every operation fails.
    pub fn always_failing(inner: S) -> Self {
        Self::new(inner, 1.0)
    }

    /// Delay every operation by `latency` before running it.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total operations attempted, failed or not.
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::Relaxed)
    }

    async fn before_operation(&self, op: &str) -> Result<(), StoreError> {
        self.operations.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let fail = self.rng.lock().next() < self.failure_rate;
        if fail {
            return Err(StoreError::Unavailable(format!("injected failure in {}", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for ChaoticStore<S> {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        self.before_operation("insert_one").await?;
        self.inner.insert_one(collection, document).await
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&Sort>,
    ) -> Result<Vec<Document>, StoreError> {
        self.before_operation("find").await?;
        self.inner.find(collection, filter, sort).await
    }

    async fn update_one(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<bool, StoreError> {
        self.before_operation("update_one").await?;
        self.inner.update_one(collection, id, patch).await
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.before_operation("delete_one").await?;
        self.inner.delete_one(collection, id).await
    }
}
