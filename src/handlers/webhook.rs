//! Inbound webhook endpoints. One generic handler serves every tenant,
//! dispatched by the path's tenant id. Processing failures are logged
//! and the endpoint still answers 200 so the platform does not retry.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{error, info, warn};

use crate::line::events::WebhookBatch;
use crate::line::signature;
use crate::services::events;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-line-signature";

pub async fn callback(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(ctx) = state.registry.resolve(&tenant_id) else {
        warn!("unknown tenant in webhook path: {tenant_id}");
        return StatusCode::NOT_FOUND.into_response();
    };

    let Some(sig) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        warn!(bot_id = %tenant_id, "missing webhook signature header");
        return StatusCode::BAD_REQUEST.into_response();
    };
    if !signature::verify(&ctx.channel_secret, &body, sig) {
        warn!(bot_id = %tenant_id, "webhook signature mismatch");
        return StatusCode::BAD_REQUEST.into_response();
    }

    let batch: WebhookBatch = match serde_json::from_slice(&body) {
        Ok(batch) => batch,
        Err(e) => {
            warn!(bot_id = %tenant_id, "webhook body parse failed: {e}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    info!(bot_id = %tenant_id, events = batch.events.len(), "received webhook");

    let Some(repo) = state.repo.as_deref() else {
        error!(bot_id = %tenant_id, "webhook dropped: database unavailable");
        return (StatusCode::OK, "OK").into_response();
    };

    for event in &batch.events {
        if let Err(e) = events::handle_event(&ctx, repo, &state.settings, event).await {
            // The unit of work already rolled back; acknowledge upstream
            // anyway so the platform does not re-deliver.
            error!(bot_id = %tenant_id, "webhook event failed: {e:#}");
        }
    }

    (StatusCode::OK, "OK").into_response()
}

/// Pre-multi-tenant route, served only in single-tenant mode.
pub async fn legacy_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let single = &state.settings.single_tenant;
    if !single.enabled || single.default_bot_id.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }
    let bot_id = single.default_bot_id.clone();
    callback(State(state), Path(bot_id), headers, body).await
}
