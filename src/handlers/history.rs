//! Reporting endpoint: one user's full exercise history, or tenant-wide
//! aggregates when no user is given.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::utils::error::ApiError;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub user_id: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum HistoryResponse {
    User(UserHistory),
    Aggregate(TenantAggregate),
}

#[derive(Serialize)]
pub struct UserHistory {
    pub user_id: String,
    pub username: Option<String>,
    pub foot_check_result: Option<String>,
    pub current_week: i32,
    pub history: Vec<HistoryItem>,
}

#[derive(Serialize)]
pub struct HistoryItem {
    pub date: DateTime<Utc>,
    pub response_text: String,
    pub response_days: i32,
    pub week_number: i32,
}

#[derive(Serialize)]
pub struct TenantAggregate {
    pub tenant: String,
    pub total_users: i64,
    pub total_responses: i64,
    pub average_exercise_days: f64,
}

pub async fn exercise_history(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Some(ctx) = state.registry.resolve(&tenant_id) else {
        return Err(ApiError::NotFound("Invalid bot_id".to_string()));
    };
    let Some(repo) = state.repo.as_deref() else {
        return Err(ApiError::ServiceUnavailable(
            "database unavailable".to_string(),
        ));
    };

    let tenant = repo
        .tenant_by_bot_id(repo.pool(), &ctx.bot_id)
        .await
        .map_err(|e| ApiError::DatabaseError(format!("{e:#}")))?
        .ok_or_else(|| ApiError::NotFound("Tenant not found".to_string()))?;

    if let Some(line_user_id) = query.user_id {
        let user = repo
            .find_user(repo.pool(), tenant.id, &line_user_id)
            .await
            .map_err(|e| ApiError::DatabaseError(format!("{e:#}")))?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        let history = repo
            .user_history(repo.pool(), user.id)
            .await
            .map_err(|e| ApiError::DatabaseError(format!("{e:#}")))?
            .into_iter()
            .map(|h| HistoryItem {
                date: h.response_date,
                response_text: h.response_text,
                response_days: h.response_days,
                week_number: h.week_number,
            })
            .collect();

        Ok(Json(HistoryResponse::User(UserHistory {
            user_id: user.line_user_id,
            username: user.username,
            foot_check_result: user.foot_check_result,
            current_week: user.current_week,
            history,
        })))
    } else {
        let total_users = repo
            .count_users(repo.pool(), tenant.id)
            .await
            .map_err(|e| ApiError::DatabaseError(format!("{e:#}")))?;
        let total_responses = repo
            .count_responses(repo.pool(), tenant.id)
            .await
            .map_err(|e| ApiError::DatabaseError(format!("{e:#}")))?;
        let average = repo
            .avg_response_days(repo.pool(), tenant.id)
            .await
            .map_err(|e| ApiError::DatabaseError(format!("{e:#}")))?;

        Ok(Json(HistoryResponse::Aggregate(TenantAggregate {
            tenant: tenant.name,
            total_users,
            total_responses,
            average_exercise_days: average.unwrap_or(0.0),
        })))
    }
}
