//! Reconciliation orchestrator: one scheduled run over every connected
//! integration. Invoked externally (cron hitting POST /sync); holds no state
//! between runs, so a failed integration is simply retried next run.

use serde::Serialize;
use sqlx::{Pool, Postgres};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::SyncError;
use crate::models::{Integration, Provider};
use crate::providers::{github, github::GithubClient, vercel, vercel::VercelClient};
use crate::telemetry::{INTEGRATION_SYNC_FAILURES, SYNC_RUNS};
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct IntegrationSyncError {
    pub integration_id: Uuid,
    pub provider: Provider,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncReport {
    pub synced_count: u32,
    pub errors: Vec<IntegrationSyncError>,
}

const INTEGRATION_COLUMNS: &str = "id, project_id, provider, config, status, last_synced_at";

/// Run one reconciliation pass. One integration's failure never aborts the
/// batch or blocks `last_synced_at` updates for the others.
pub async fn run_sync(state: &AppState) -> Result<SyncReport, sqlx::Error> {
    let integrations = sqlx::query_as::<_, Integration>(&format!(
        "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE status = 'connected' ORDER BY id"
    ))
    .fetch_all(&state.db)
    .await?;

    let mut report = SyncReport { synced_count: 0, errors: Vec::new() };
    for integration in &integrations {
        match sync_one(state, integration).await {
            Ok(created) => {
                mark_synced(&state.db, integration.id).await;
                report.synced_count += 1;
                info!(
                    integration_id = %integration.id,
                    provider = %integration.provider,
                    created,
                    "integration synced"
                );
            }
            Err(err) => {
                INTEGRATION_SYNC_FAILURES
                    .with_label_values(&[integration.provider.as_str()])
                    .inc();
                if err.is_auth() {
                    // Credential is bad; surface through integration status
                    // instead of retrying with the same token every run.
                    mark_disconnected(&state.db, integration.id).await;
                    warn!(
                        integration_id = %integration.id,
                        provider = %integration.provider,
                        error = %err,
                        "credentials rejected, integration disconnected"
                    );
                } else {
                    warn!(
                        integration_id = %integration.id,
                        provider = %integration.provider,
                        error = %err,
                        "integration sync failed, will retry next run"
                    );
                }
                report.errors.push(IntegrationSyncError {
                    integration_id: integration.id,
                    provider: integration.provider,
                    error: err.to_string(),
                });
            }
        }
    }
    SYNC_RUNS.inc();
    info!(
        connected = integrations.len(),
        synced = report.synced_count,
        failed = report.errors.len(),
        "sync run complete"
    );
    Ok(report)
}

async fn sync_one(state: &AppState, integration: &Integration) -> Result<u32, SyncError> {
    let token = integration
        .token()
        .ok_or_else(|| SyncError::Auth("integration config has no token".to_string()))?;
    match integration.provider {
        Provider::Github => {
            let client =
                GithubClient::new(state.http.clone(), state.cfg.github_api_base.clone(), token);
            github::sync_integration(&state.db, &client, integration).await
        }
        Provider::Vercel => {
            let client =
                VercelClient::new(state.http.clone(), state.cfg.vercel_api_base.clone(), token);
            vercel::sync_integration(&state.db, &client, integration, state.cfg.build_rate_per_min)
                .await
        }
    }
}

async fn mark_synced(pool: &Pool<Postgres>, id: Uuid) {
    if let Err(e) = sqlx::query("UPDATE integrations SET last_synced_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
    {
        warn!(integration_id = %id, error = %e, "failed to record last_synced_at");
    }
}

async fn mark_disconnected(pool: &Pool<Postgres>, id: Uuid) {
    if let Err(e) = sqlx::query("UPDATE integrations SET status = 'disconnected' WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
    {
        warn!(integration_id = %id, error = %e, "failed to mark integration disconnected");
    }
}
