//! Relational store collaborators
//!
//! The gateway only ever talks to a store through [`Store::query`]. Two
//! adapters exist:
//! - `sqlite`: an embedded SQLite file (or in-memory database for tests)
//! - `postgres`: a PostgreSQL database reached through a deadpool pool
//!
//! A [`StoreConnector`] knows how to open one of these on demand; the gateway
//! decides when.

mod dialect;
mod postgres;
mod sqlite;
mod value;

pub use dialect::{contains_pattern, Dialect};
pub use postgres::{PostgresConnector, PostgresStore};
pub use sqlite::{SqliteConnector, SqliteStore};
pub use value::SqlValue;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// One result row. Column order is preserved as returned by the store.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store: {cause}")]
    Open { cause: String },

    #[error("{cause}")]
    Query { cause: String },
}

impl StoreError {
    pub fn query(cause: impl Into<String>) -> Self {
        StoreError::Query {
            cause: cause.into(),
        }
    }
}

/// Rows and column names produced by a single statement.
///
/// Statements that produce no result set (DDL, plain INSERT) yield no columns
/// and no rows.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Run one statement with positional parameters.
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult, StoreError>;

    fn dialect(&self) -> Dialect;
}

#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Open a fresh store handle. Called at most once per successful
    /// initialization.
    async fn connect(&self) -> Result<Arc<dyn Store>, StoreError>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}
