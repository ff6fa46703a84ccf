//! Embedded SQLite store
//!
//! A single connection guarded by a mutex. Statements run on tokio's blocking
//! pool so callers never stall the async executor while SQLite works.

use super::dialect::FOLD_CASE_FUNCTION;
use super::{Dialect, QueryResult, Row, SqlValue, Store, StoreConnector, StoreError};
use async_trait::async_trait;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Opens [`SqliteStore`]s at a fixed location.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    location: Location,
}

impl SqliteConnector {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
        }
    }

    /// A private database that lives as long as the opened store.
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
        }
    }
}

#[async_trait]
impl StoreConnector for SqliteConnector {
    async fn connect(&self) -> Result<Arc<dyn Store>, StoreError> {
        let location = self.location.clone();
        let store = tokio::task::spawn_blocking(move || SqliteStore::open(&location))
            .await
            .map_err(|e| StoreError::Open {
                cause: format!("open worker failed: {}", e),
            })??;
        Ok(Arc::new(store))
    }

    fn backend(&self) -> &'static str {
        Dialect::Sqlite.name()
    }
}

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    fn open(location: &Location) -> Result<Self, StoreError> {
        let conn = match location {
            Location::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| StoreError::Open {
                        cause: format!("cannot create directory {:?}: {}", parent, e),
                    })?;
                }
                let conn = Connection::open(path).map_err(open_err)?;
                // WAL lets a second process read while this one writes.
                conn.execute_batch("PRAGMA journal_mode=WAL;")
                    .map_err(open_err)?;
                info!("Opened SQLite store at {:?}", path);
                conn
            }
            Location::Memory => {
                let conn = Connection::open_in_memory().map_err(open_err)?;
                info!("Opened in-memory SQLite store");
                conn
            }
        };

        conn.busy_timeout(Duration::from_secs(5)).map_err(open_err)?;
        conn.create_scalar_function(
            FOLD_CASE_FUNCTION,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
        )
        .map_err(open_err)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult, StoreError> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::query(format!("connection lock poisoned: {}", e)))?;
            run_statement(&conn, &sql, &params)
        })
        .await
        .map_err(|e| StoreError::query(format!("query worker failed: {}", e)))?
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}

fn run_statement(
    conn: &Connection,
    sql: &str,
    params: &[SqlValue],
) -> Result<QueryResult, StoreError> {
    let mut stmt = conn.prepare(sql).map_err(query_err)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    if columns.is_empty() {
        let affected = stmt
            .execute(params_from_iter(params.iter()))
            .map_err(query_err)?;
        debug!("SQLite statement affected {} rows", affected);
        return Ok(QueryResult::default());
    }

    let mut rows = stmt
        .query(params_from_iter(params.iter()))
        .map_err(query_err)?;
    let mut result_rows = Vec::new();

    while let Some(row) = rows.next().map_err(query_err)? {
        let mut map = Row::new();
        for (i, name) in columns.iter().enumerate() {
            let value = row.get_ref(i).map_err(query_err)?;
            map.insert(name.clone(), value_to_json(value));
        }
        result_rows.push(map);
    }

    Ok(QueryResult {
        columns,
        rows: result_rows,
    })
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}

fn open_err(e: rusqlite::Error) -> StoreError {
    StoreError::Open {
        cause: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> StoreError {
    StoreError::query(e.to_string())
}
