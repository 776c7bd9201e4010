use axum::{extract::State, Json};

use crate::error::{ApiError, ApiResult};
use crate::services::orchestrator::{self, SyncReport};
use crate::AppState;

/// Trigger a reconciliation pass over all connected integrations.
/// This is the external scheduler's entry point; the service never
/// self-schedules.
#[utoipa::path(post, path = "/sync", responses( (status = 200, body = SyncReport) ))]
#[tracing::instrument(level = "info", skip(state))]
pub async fn run_sync(State(state): State<AppState>) -> ApiResult<Json<SyncReport>> {
    let report = orchestrator::run_sync(&state)
        .await
        .map_err(|e| ApiError::internal(format!("sync run failed: {e}")))?;
    Ok(Json(report))
}
