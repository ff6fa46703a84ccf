//! PostgreSQL store
//!
//! Statements are prepared first so parameters can be bound with the types
//! the server inferred for each placeholder. Result columns are decoded by
//! their declared type into JSON values.

use super::{Dialect, QueryResult, Row, SqlValue, Store, StoreConnector, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use postgres_types::{ToSql, Type};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::{debug, info};

type BoundParam = Box<dyn ToSql + Sync + Send>;

/// Opens a pooled [`PostgresStore`] for one database URL.
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    database_url: String,
    max_connections: u32,
}

impl PostgresConnector {
    pub fn new(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections,
        }
    }
}

#[async_trait]
impl StoreConnector for PostgresConnector {
    async fn connect(&self) -> Result<Arc<dyn Store>, StoreError> {
        let pool = create_pool(&self.database_url, self.max_connections)?;

        let client = pool.get().await.map_err(|e| StoreError::Open {
            cause: e.to_string(),
        })?;

        client
            .execute("SELECT 1", &[])
            .await
            .map_err(|e| StoreError::Open {
                cause: format!("Ping failed: {}", e),
            })?;

        info!("Connected to PostgreSQL store");

        Ok(Arc::new(PostgresStore { pool }))
    }

    fn backend(&self) -> &'static str {
        Dialect::Postgres.name()
    }
}

pub struct PostgresStore {
    pool: Pool,
}

#[async_trait]
impl Store for PostgresStore {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult, StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::query(format!("Pool error: {}", e)))?;

        let stmt = client.prepare(sql).await.map_err(pg_err)?;

        let expected = stmt.params();
        if expected.len() != params.len() {
            return Err(StoreError::query(format!(
                "statement expects {} parameters, got {}",
                expected.len(),
                params.len()
            )));
        }

        let bound = expected
            .iter()
            .zip(params)
            .enumerate()
            .map(|(i, (ty, value))| bind_param(i + 1, ty, value))
            .collect::<Result<Vec<BoundParam>, StoreError>>()?;
        let refs: Vec<&(dyn ToSql + Sync)> = bound
            .iter()
            .map(|b| &**b as &(dyn ToSql + Sync))
            .collect();

        let rows = client.query(&stmt, &refs).await.map_err(pg_err)?;

        let columns: Vec<String> = stmt
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let mut result_rows = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut map = Row::new();
            for (i, name) in columns.iter().enumerate() {
                map.insert(name.clone(), column_value(row, i));
            }
            result_rows.push(map);
        }

        debug!("PostgreSQL statement returned {} rows", result_rows.len());

        Ok(QueryResult {
            columns,
            rows: result_rows,
        })
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }
}

fn create_pool(database_url: &str, max_size: u32) -> Result<Pool, StoreError> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(database_url.to_string());

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size: max_size.max(1) as usize,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(5)),
            recycle: Some(Duration::from_secs(5)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| StoreError::Open {
            cause: format!("Failed to create pool: {}", e),
        })
}

fn pg_err(e: tokio_postgres::Error) -> StoreError {
    match e.as_db_error() {
        Some(db) => StoreError::query(db.message().to_string()),
        None => StoreError::query(e.to_string()),
    }
}

/// Bind a parameter as the type the server expects at placeholder `index`.
fn bind_param(index: usize, ty: &Type, value: &SqlValue) -> Result<BoundParam, StoreError> {
    let mismatch = || {
        StoreError::query(format!(
            "parameter ${} cannot be bound as {}: {:?}",
            index, ty, value
        ))
    };

    let bound: BoundParam = match *ty {
        Type::BOOL => Box::new(as_bool(value).ok_or_else(mismatch)?),
        Type::INT2 => Box::new(
            as_i64(value)
                .and_then(|v| v.map(i16::try_from).transpose().ok())
                .ok_or_else(mismatch)?,
        ),
        Type::INT4 => Box::new(
            as_i64(value)
                .and_then(|v| v.map(i32::try_from).transpose().ok())
                .ok_or_else(mismatch)?,
        ),
        Type::INT8 => Box::new(as_i64(value).ok_or_else(mismatch)?),
        Type::FLOAT4 => Box::new(as_f64(value).ok_or_else(mismatch)?.map(|f| f as f32)),
        Type::FLOAT8 => Box::new(as_f64(value).ok_or_else(mismatch)?),
        Type::JSON | Type::JSONB => Box::new(as_json(value)),
        Type::TIMESTAMP => Box::new(as_timestamp(value).ok_or_else(mismatch)?),
        Type::TIMESTAMPTZ => Box::new(
            as_timestamp(value)
                .ok_or_else(mismatch)?
                .map(|ts| DateTime::<Utc>::from_naive_utc_and_offset(ts, Utc)),
        ),
        Type::DATE => Box::new(as_date(value).ok_or_else(mismatch)?),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            Box::new(as_text(value))
        }
        _ => {
            return Err(StoreError::query(format!(
                "parameter ${} has unsupported type {}",
                index, ty
            )))
        }
    };

    Ok(bound)
}

// Each `as_*` returns `None` when the value cannot represent the target type,
// and `Some(None)` for SQL NULL.

fn as_bool(value: &SqlValue) -> Option<Option<bool>> {
    match value {
        SqlValue::Null => Some(None),
        SqlValue::Bool(b) => Some(Some(*b)),
        SqlValue::Integer(0) => Some(Some(false)),
        SqlValue::Integer(1) => Some(Some(true)),
        SqlValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Some(Some(true)),
            "false" | "f" | "0" => Some(Some(false)),
            _ => None,
        },
        _ => None,
    }
}

fn as_i64(value: &SqlValue) -> Option<Option<i64>> {
    match value {
        SqlValue::Null => Some(None),
        SqlValue::Integer(i) => Some(Some(*i)),
        SqlValue::Bool(b) => Some(Some(i64::from(*b))),
        SqlValue::Text(s) => s.trim().parse().ok().map(Some),
        SqlValue::Real(_) => None,
    }
}

fn as_f64(value: &SqlValue) -> Option<Option<f64>> {
    match value {
        SqlValue::Null => Some(None),
        SqlValue::Integer(i) => Some(Some(*i as f64)),
        SqlValue::Real(f) => Some(Some(*f)),
        SqlValue::Text(s) => s.trim().parse().ok().map(Some),
        SqlValue::Bool(_) => None,
    }
}

fn as_text(value: &SqlValue) -> Option<String> {
    match value {
        SqlValue::Null => None,
        SqlValue::Bool(b) => Some(b.to_string()),
        SqlValue::Integer(i) => Some(i.to_string()),
        SqlValue::Real(f) => Some(f.to_string()),
        SqlValue::Text(s) => Some(s.clone()),
    }
}

fn as_json(value: &SqlValue) -> Option<Value> {
    match value {
        SqlValue::Null => None,
        SqlValue::Bool(b) => Some(Value::Bool(*b)),
        SqlValue::Integer(i) => Some(Value::from(*i)),
        SqlValue::Real(f) => Some(Value::from(*f)),
        SqlValue::Text(s) => {
            Some(serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())))
        }
    }
}

fn as_timestamp(value: &SqlValue) -> Option<Option<NaiveDateTime>> {
    match value {
        SqlValue::Null => Some(None),
        SqlValue::Text(s) => parse_timestamp(s).map(Some),
        _ => None,
    }
}

fn as_date(value: &SqlValue) -> Option<Option<NaiveDate>> {
    match value {
        SqlValue::Null => Some(None),
        SqlValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok().map(Some),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn json_or_null<T: Into<Value>>(result: Result<Option<T>, tokio_postgres::Error>) -> Value {
    result.ok().flatten().map(Into::into).unwrap_or(Value::Null)
}

fn column_value(row: &tokio_postgres::Row, idx: usize) -> Value {
    let col_type = row.columns()[idx].type_();

    match *col_type {
        Type::BOOL => json_or_null(row.try_get::<_, Option<bool>>(idx)),
        Type::INT2 => json_or_null(row.try_get::<_, Option<i16>>(idx)),
        Type::INT4 => json_or_null(row.try_get::<_, Option<i32>>(idx)),
        Type::INT8 => json_or_null(row.try_get::<_, Option<i64>>(idx)),
        Type::FLOAT4 => json_or_null(row.try_get::<_, Option<f32>>(idx)),
        Type::FLOAT8 => json_or_null(row.try_get::<_, Option<f64>>(idx)),
        Type::JSON | Type::JSONB => json_or_null(row.try_get::<_, Option<Value>>(idx)),
        Type::TIMESTAMPTZ => json_or_null(
            row.try_get::<_, Option<DateTime<Utc>>>(idx)
                .map(|v| v.map(|ts| ts.to_rfc3339())),
        ),
        Type::TIMESTAMP => json_or_null(
            row.try_get::<_, Option<NaiveDateTime>>(idx)
                .map(|v| v.map(|ts| ts.to_string())),
        ),
        Type::DATE => json_or_null(
            row.try_get::<_, Option<NaiveDate>>(idx)
                .map(|v| v.map(|d| d.to_string())),
        ),
        _ => json_or_null(row.try_get::<_, Option<String>>(idx)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_text_accepts_any_scalar() {
        assert!(bind_param(1, &Type::TEXT, &SqlValue::Text("Doe".to_string())).is_ok());
        assert!(bind_param(1, &Type::TEXT, &SqlValue::Integer(5)).is_ok());
        assert!(bind_param(1, &Type::UNKNOWN, &SqlValue::Null).is_ok());
    }

    #[test]
    fn test_bind_integers() {
        assert!(bind_param(1, &Type::INT4, &SqlValue::Integer(42)).is_ok());
        assert!(bind_param(1, &Type::INT4, &SqlValue::Text("42".to_string())).is_ok());
        assert!(bind_param(1, &Type::INT4, &SqlValue::Null).is_ok());
        assert!(bind_param(1, &Type::INT2, &SqlValue::Integer(70_000)).is_err());
        assert!(bind_param(1, &Type::INT8, &SqlValue::Real(1.5)).is_err());
    }

    #[test]
    fn test_bind_unsupported_type() {
        let err = bind_param(3, &Type::POINT, &SqlValue::Text("(1,2)".to_string())).unwrap_err();
        assert!(err.to_string().contains("$3"));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(as_bool(&SqlValue::Text("TRUE".to_string())), Some(Some(true)));
        assert_eq!(as_bool(&SqlValue::Integer(2)), None);
        assert_eq!(as_f64(&SqlValue::Integer(2)), Some(Some(2.0)));
        assert_eq!(as_text(&SqlValue::Real(2.5)), Some("2.5".to_string()));
        assert_eq!(
            as_json(&SqlValue::Text("[1,2]".to_string())),
            Some(serde_json::json!([1, 2]))
        );
        assert_eq!(as_json(&SqlValue::Text("plain".to_string())), Some(Value::from("plain")));
        assert_eq!(
            as_date(&SqlValue::Text("1990-01-01".to_string())),
            Some(NaiveDate::from_ymd_opt(1990, 1, 1))
        );
        assert_eq!(as_date(&SqlValue::Text("01/01/1990".to_string())), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(10, 30, 0))
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-05 10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T10:30:00Z"), Some(expected));
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_is_open_error() {
        let connector = PostgresConnector::new("not-a-url", 2);
        let result = connector.connect().await;
        assert!(matches!(result, Err(StoreError::Open { .. })));
    }
}
