use axum::{extract::{Path, Query, State}, Json};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult, SyncError};
use crate::models::{Deployment, Integration};
use crate::providers::vercel::VercelClient;
use crate::store;
use crate::AppState;

#[derive(Deserialize, ToSchema)]
pub struct DeploymentQuery {
    pub project_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List canonical deployments (optionally filtered by project, paginated).
/// This is the dashboard's read path over the reconciled timeline.
#[utoipa::path(get, path = "/deployments", params(
    ("project_id" = Option<Uuid>, Query, description = "Filter by project"),
    ("limit" = Option<i64>, Query, description = "Max items (default 100, max 1000)"),
    ("offset" = Option<i64>, Query, description = "Offset")
), responses( (status = 200, body = [Deployment]) ))]
#[tracing::instrument(level = "debug", skip(state, q), fields(project_id = ?q.project_id))]
pub async fn list_deployments(
    State(state): State<AppState>,
    Query(q): Query<DeploymentQuery>,
) -> ApiResult<Json<Vec<Deployment>>> {
    let limit = q.limit.unwrap_or(100).clamp(1, 1000);
    let offset = q.offset.unwrap_or(0).max(0);
    let rows = store::list(&state.db, q.project_id, limit, offset)
        .await
        .map_err(|e| ApiError::internal(format!("query error: {e}")))?;
    Ok(Json(rows))
}

/// Fetch build logs for one deployment on demand from the build provider.
/// Logs are never stored or reconciled.
#[utoipa::path(get, path = "/deployments/{id}/logs", params( ("id" = Uuid, Path, description = "Deployment id") ), responses(
    (status = 200, description = "Provider log events"),
    (status = 404, description = "Deployment unknown or has no provider logs")
))]
#[tracing::instrument(level = "debug", skip(state))]
pub async fn deployment_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let deployment: Deployment = store::get(&state.db, id)
        .await
        .map_err(|e| ApiError::internal(format!("query error: {e}")))?
        .ok_or_else(|| ApiError::not_found("deployment not found"))?;
    let Some(external_id) = deployment.external_id else {
        return Err(ApiError::not_found("commit-sourced deployment has no build logs"));
    };
    let integration = sqlx::query_as::<_, Integration>(
        "SELECT id, project_id, provider, config, status, last_synced_at FROM integrations \
         WHERE project_id = $1 AND provider = 'vercel'",
    )
    .bind(deployment.project_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(format!("integration lookup failed: {e}")))?
    .ok_or_else(|| ApiError::not_found("no build provider integration for project"))?;
    let token = integration
        .token()
        .ok_or_else(|| ApiError::not_found("build provider integration has no token"))?;
    let client = VercelClient::new(state.http.clone(), state.cfg.vercel_api_base.clone(), token);
    let events = client.deployment_events(&external_id).await.map_err(|e| match e {
        SyncError::Auth(msg) => ApiError::bad_gateway(format!("provider rejected credentials: {msg}")),
        other => ApiError::bad_gateway(other.to_string()),
    })?;
    Ok(Json(events))
}
