//! HTTP surface
//!
//! Routes requests onto the shared [`Gateway`]. Handlers live in the
//! submodules; `router` wires them together with request tracing.

mod health;
mod patients;
mod query;
mod validation;

pub use health::{dashboard, health_check};
pub use patients::{
    export_patients, list_patients, register_patient, sort_patients, SortField, SortOrder,
};
pub use query::{export_query, run_query};
pub use validation::{validate_registration, RegistrationForm};

use crate::gateway::Gateway;
use axum::{
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            started_at: Instant::now(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check never touches the store
        .route("/health", get(health_check))
        .route("/dashboard", get(dashboard))
        .route("/patients", get(list_patients).post(register_patient))
        .route("/patients/export", get(export_patients))
        .route("/query", post(run_query))
        .route("/query/export", post(export_query))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON body served as a file download.
pub(crate) fn json_attachment(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}
