use axum::{
    extract::{Query, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AdminClaims;
use crate::error::Result;
use crate::middleware::ValidJson;
use crate::state::AppState;
use crate::storage::{ActivityRecord, ActivityType, DashboardStats, NewActivity, NewVisit};

const DEFAULT_ACTIVITY_LIMIT: i64 = 50;

/// Records an activity row in the background; failures are only logged.
pub(crate) fn track_activity(state: &AppState, session_id: &str, activity_type: ActivityType, product_id: Option<Uuid>) {
    let storage = state.storage().clone();
    let activity = NewActivity { session_id: session_id.to_string(), activity_type, product_id, metadata: None };
    tokio::spawn(async move {
        if let Err(e) = storage.record_activity(&activity).await {
            tracing::warn!(error = %e, session_id = %activity.session_id, "failed to record customer activity");
        }
    });
}

pub async fn record_activity(State(state): State<AppState>, ValidJson(activity): ValidJson<NewActivity>) -> Result<StatusCode> {
    state.storage().record_activity(&activity).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn record_visit(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(visit): ValidJson<NewVisit>,
) -> Result<StatusCode> {
    let user_agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok());
    state.storage().record_visit(&visit, user_agent).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn dashboard(_admin: AdminClaims, State(state): State<AppState>) -> Result<Json<DashboardStats>> {
    Ok(Json(state.storage().dashboard_stats().await?))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub session_id: Option<String>,
    pub limit: Option<i64>,
}

pub async fn recent_activity(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityRecord>>> {
    let session = query.session_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let records = state.storage().recent_activity(session, query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT)).await?;
    Ok(Json(records))
}
