use crate::api::AppState;
use crate::error::Result;
use crate::gateway::GatewayStatus;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    #[serde(flatten)]
    store: GatewayStatus,
    uptime_seconds: u64,
}

/// Report the store's lifecycle without triggering initialization.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.gateway.status();

    Json(HealthResponse {
        status: if store.handle.initialized {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        store,
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
pub struct DashboardResponse {
    patient_count: usize,
}

pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardResponse>> {
    let patients = state.gateway.list_all().await?;

    Ok(Json(DashboardResponse {
        patient_count: patients.len(),
    }))
}
