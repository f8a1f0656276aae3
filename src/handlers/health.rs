use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    tenants: usize,
    database: bool,
    version: String,
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            tenants: state.registry.len(),
            database: state.repo.is_some(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
