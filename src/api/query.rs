//! Query console endpoints
//!
//! - POST /query - Run free-form SQL and get the result envelope back
//! - POST /query/export - Run the same SQL and download the rows as JSON
//!
//! Store failures are reported inside the envelope with a 200 status; only a
//! blank query is rejected up front.

use crate::api::{json_attachment, AppState};
use crate::error::{GatewayError, Result};
use crate::export::{to_pretty_json, QUERY_EXPORT_FILENAME};
use crate::gateway::QueryEnvelope;
use crate::store::SqlValue;
use axum::{extract::State, response::Response, Json};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl QueryRequest {
    fn checked(self) -> Result<(String, Vec<SqlValue>)> {
        if self.sql.trim().is_empty() {
            return Err(GatewayError::InvalidRequest {
                message: "SQL query must not be empty".to_string(),
            });
        }
        let params = self.params.into_iter().map(SqlValue::from).collect();
        Ok((self.sql, params))
    }
}

pub async fn run_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryEnvelope>> {
    let (sql, params) = request.checked()?;
    Ok(Json(state.gateway.execute(&sql, &params).await))
}

pub async fn export_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Response> {
    let (sql, params) = request.checked()?;
    let envelope = state.gateway.execute(&sql, &params).await;

    if !envelope.success {
        return Err(GatewayError::InvalidRequest {
            message: envelope
                .error
                .unwrap_or_else(|| "Query failed".to_string()),
        });
    }

    let body = to_pretty_json(&envelope.rows)?;
    Ok(json_attachment(QUERY_EXPORT_FILENAME, body))
}
