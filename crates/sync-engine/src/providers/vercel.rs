//! Build-provider poll adapter: fetches recent deployments for a linked
//! Vercel project and upserts them by provider-assigned id. Poll re-delivery
//! of an already-recorded event is a guaranteed no-op via the dedup store.

use serde::Deserialize;
use sqlx::{Pool, Postgres};
use tracing::debug;

use crate::cost;
use crate::error::SyncError;
use crate::models::{Integration, Provider};
use crate::normalize::normalize_status;
use crate::providers::{check_status, transport_error};
use crate::store::{self, DedupKey, NewDeployment};

/// How many deployments to pull per sync run.
pub const POLL_FETCH_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct DeploymentList {
    pub deployments: Vec<VercelDeployment>,
}

#[derive(Debug, Deserialize)]
pub struct VercelDeployment {
    pub uid: String,
    pub state: Option<String>,
    /// Millisecond epoch timestamps as reported by the provider.
    pub created: i64,
    pub ready: Option<i64>,
    pub target: Option<String>,
    #[serde(default)]
    pub meta: VercelMeta,
}

/// Commit provenance nested under the provider's `meta` object.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct VercelMeta {
    #[serde(rename = "githubCommitSha")]
    pub commit_sha: Option<String>,
    #[serde(rename = "githubCommitMessage")]
    pub commit_message: Option<String>,
    #[serde(rename = "githubCommitRef")]
    pub commit_ref: Option<String>,
}

pub struct VercelClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl VercelClient {
    pub fn new(http: reqwest::Client, base: impl Into<String>, token: impl Into<String>) -> Self {
        Self { http, base: base.into(), token: token.into() }
    }

    pub async fn recent_deployments(
        &self,
        provider_project_id: &str,
        limit: usize,
    ) -> Result<Vec<VercelDeployment>, SyncError> {
        let resp = self
            .http
            .get(format!("{}/v6/deployments", self.base))
            .query(&[("projectId", provider_project_id), ("limit", &limit.to_string())])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport_error)?;
        let list: DeploymentList = check_status(resp).await?.json().await.map_err(transport_error)?;
        Ok(list.deployments)
    }

    /// On-demand build log fetch. Not part of reconciliation; the dashboard
    /// calls this lazily per deployment.
    pub async fn deployment_events(&self, uid: &str) -> Result<serde_json::Value, SyncError> {
        let resp = self
            .http
            .get(format!("{}/v2/deployments/{uid}/events", self.base))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(resp).await?.json().await.map_err(transport_error)
    }
}

/// Turn one polled deployment into candidate fields. The webhook path applies
/// the same normalize/cost/upsert discipline to its own payload shape, so
/// whichever observer arrives first produces the row.
fn candidate_from_poll(d: &VercelDeployment, rate_per_minute: f64) -> NewDeployment {
    let duration = cost::duration_seconds(d.created, d.ready);
    NewDeployment {
        commit_hash: d.meta.commit_sha.clone(),
        commit_message: d.meta.commit_message.clone(),
        branch: d.meta.commit_ref.clone(),
        environment: d.target.clone().unwrap_or_else(|| "production".to_string()),
        status: normalize_status(Provider::Vercel, d.state.as_deref().unwrap_or("")),
        duration_seconds: duration,
        cost: duration.map(|secs| cost::estimate_cost(secs, rate_per_minute)),
        created_at: chrono::DateTime::from_timestamp_millis(d.created).unwrap_or_else(chrono::Utc::now),
    }
}

/// Sync one Vercel-linked integration. Returns the number of rows created.
pub async fn sync_integration(
    pool: &Pool<Postgres>,
    client: &VercelClient,
    integration: &Integration,
    rate_per_minute: f64,
) -> Result<u32, SyncError> {
    let provider_project_id = integration
        .provider_project_id()
        .ok_or_else(|| SyncError::Auth("integration config has no provider project id".to_string()))?;
    let deployments = client.recent_deployments(provider_project_id, POLL_FETCH_LIMIT).await?;
    let mut created = 0u32;
    for d in deployments {
        let key = DedupKey::External {
            project_id: integration.project_id,
            external_id: d.uid.clone(),
        };
        let candidate = candidate_from_poll(&d, rate_per_minute);
        let (_, was_created) = store::upsert(pool, &key, candidate).await?;
        crate::telemetry::DEPLOYMENTS_UPSERTED
            .with_label_values(&["vercel", if was_created { "created" } else { "deduped" }])
            .inc();
        if was_created {
            created += 1;
        }
    }
    debug!(integration_id = %integration.id, created, "vercel sync complete");
    Ok(created)
}
