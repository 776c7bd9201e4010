//! Integration lifecycle endpoints. Creation is where the provider-side
//! project id mapping enters the system; the webhook path only ever resolves
//! against what was stored here.

use axum::{extract::{Path, State}, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{Integration, Provider};
use crate::AppState;

#[derive(Deserialize, ToSchema)]
pub struct LinkIntegrationRequest {
    pub project_id: Uuid,
    pub provider: Provider,
    /// Opaque credential + provider settings blob (token, provider-side
    /// project id, branch override). Stored as-is; this service only reads
    /// the fields it needs.
    #[schema(value_type = Object)]
    pub config: serde_json::Value,
}

/// Link a provider to a project, or refresh the config of an existing link.
/// Re-linking resets the integration to connected.
#[utoipa::path(post, path = "/integrations", request_body = LinkIntegrationRequest, responses(
    (status = 201, body = Integration),
    (status = 404, description = "project not found")
))]
#[tracing::instrument(level = "info", skip(state, req), fields(project_id = %req.project_id, provider = %req.provider))]
pub async fn link_integration(
    State(state): State<AppState>,
    Json(req): Json<LinkIntegrationRequest>,
) -> ApiResult<(StatusCode, Json<Integration>)> {
    let integration = sqlx::query_as::<_, Integration>(
        "INSERT INTO integrations (project_id, provider, config, status) VALUES ($1, $2, $3, 'connected') \
         ON CONFLICT (project_id, provider) DO UPDATE SET config = EXCLUDED.config, status = 'connected' \
         RETURNING id, project_id, provider, config, status, last_synced_at",
    )
    .bind(req.project_id)
    .bind(req.provider)
    .bind(&req.config)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            ApiError::not_found("project not found")
        }
        _ => ApiError::internal(format!("insert failure: {e}")),
    })?;
    tracing::info!(integration_id = %integration.id, "integration linked");
    Ok((StatusCode::CREATED, Json(integration)))
}

/// List all integrations with their sync bookkeeping state.
#[utoipa::path(get, path = "/integrations", responses( (status = 200, body = [Integration]) ))]
pub async fn list_integrations(State(state): State<AppState>) -> ApiResult<Json<Vec<Integration>>> {
    let rows = sqlx::query_as::<_, Integration>(
        "SELECT id, project_id, provider, config, status, last_synced_at FROM integrations ORDER BY project_id, provider",
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(format!("query error: {e}")))?;
    Ok(Json(rows))
}

/// Disconnect a provider: the integration row is deleted outright.
#[utoipa::path(delete, path = "/integrations/{id}", params( ("id" = Uuid, Path, description = "Integration id") ), responses(
    (status = 204, description = "deleted"),
    (status = 404, description = "integration not found")
))]
#[tracing::instrument(level = "info", skip(state))]
pub async fn unlink_integration(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM integrations WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::internal(format!("delete failure: {e}")))?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("integration not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
