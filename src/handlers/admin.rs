//! Operational trigger endpoints: run one sweep on demand, or push the
//! weekly question to every answer-pending user with no 7-day gate.
//! Both exist for testing a live deployment.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::services::scheduler;
use crate::state::AppState;
use crate::utils::error::ApiError;

pub async fn run_scheduler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    if state.repo.is_none() {
        return Err(ApiError::ServiceUnavailable(
            "database unavailable".to_string(),
        ));
    }
    let report = scheduler::run_sweep(&state).await;
    Ok(Json(json!({
        "status": "success",
        "message": "reminder sweep executed",
        "report": report,
    })))
}

pub async fn send_now(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    if state.repo.is_none() {
        return Err(ApiError::ServiceUnavailable(
            "database unavailable".to_string(),
        ));
    }
    let results = scheduler::send_now(&state)
        .await
        .map_err(|e| ApiError::InternalError(format!("{e:#}")))?;
    Ok(Json(json!({
        "status": "success",
        "message": "unconditional reminder push finished",
        "results": results,
    })))
}
