//! Test doubles for the store collaborators.

use crate::store::{Dialect, QueryResult, SqlValue, Store, StoreConnector, StoreError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

enum Target {
    Connector(Box<dyn StoreConnector>),
    Store(Arc<dyn Store>),
}

/// Counts connection attempts and fails the first `failures` of them.
pub struct CountingConnector {
    target: Target,
    failures: usize,
    attempts: AtomicUsize,
}

impl CountingConnector {
    pub fn new(inner: impl StoreConnector + 'static, failures: usize) -> Self {
        Self {
            target: Target::Connector(Box::new(inner)),
            failures,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn with_store(store: impl Store + 'static) -> Self {
        Self {
            target: Target::Store(Arc::new(store)),
            failures: 0,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for CountingConnector {
    async fn connect(&self) -> Result<Arc<dyn Store>, StoreError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        // Keep the attempt in flight long enough for other callers to pile up.
        tokio::time::sleep(Duration::from_millis(10)).await;

        if attempt < self.failures {
            return Err(StoreError::Open {
                cause: "simulated open failure".to_string(),
            });
        }

        match &self.target {
            Target::Connector(inner) => inner.connect().await,
            Target::Store(store) => Ok(Arc::clone(store)),
        }
    }

    fn backend(&self) -> &'static str {
        "counting"
    }
}

/// Answers every statement with the same canned outcome.
pub struct CannedStore {
    outcome: Result<QueryResult, String>,
}

impl CannedStore {
    pub fn returning(result: QueryResult) -> Self {
        Self {
            outcome: Ok(result),
        }
    }

    pub fn failing(err: StoreError) -> Self {
        Self {
            outcome: Err(err.to_string()),
        }
    }
}

#[async_trait]
impl Store for CannedStore {
    async fn query(&self, _sql: &str, _params: &[SqlValue]) -> Result<QueryResult, StoreError> {
        self.outcome.clone().map_err(StoreError::query)
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}
