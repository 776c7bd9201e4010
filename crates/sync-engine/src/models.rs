use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Canonical deployment status. `Unknown` is reserved for commit-sourced rows
/// where no build outcome exists; build-provider rows only ever carry the
/// other four values.
#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Queued,
    Building,
    Success,
    Failed,
    Unknown,
}

impl DeploymentStatus {
    /// Terminal statuses freeze the row: no later observation may change them.
    pub fn is_terminal(self) -> bool {
        matches!(self, DeploymentStatus::Success | DeploymentStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentStatus::Queued => "queued",
            DeploymentStatus::Building => "building",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Github,
    Vercel,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Github => "github",
            Provider::Vercel => "vercel",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    Connected,
    Disconnected,
}

/// Canonical deployment row. Owned exclusively by the reconciliation pipeline;
/// everything downstream (dashboard, alerting) only reads these.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct Deployment {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Provider-assigned id; present for build-provider rows, absent for
    /// commit-sourced rows.
    pub external_id: Option<String>,
    pub commit_hash: Option<String>,
    pub commit_message: Option<String>,
    pub branch: Option<String>,
    pub environment: String,
    pub status: DeploymentStatus,
    pub duration_seconds: Option<i32>,
    pub cost: Option<f64>,
    /// Event time as reported by the provider, not ingestion time.
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Stored credential/config record linking a project to one provider.
/// Read-only here except for the sync bookkeeping fields.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct Integration {
    pub id: Uuid,
    pub project_id: Uuid,
    pub provider: Provider,
    #[schema(value_type = Object)]
    pub config: serde_json::Value,
    pub status: IntegrationStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl Integration {
    /// Bearer token for the provider API.
    pub fn token(&self) -> Option<&str> {
        self.config.get("token").and_then(|v| v.as_str())
    }

    /// Provider-side project identifier (e.g. the Vercel project id). This is
    /// the explicit mapping the webhook path resolves against.
    pub fn provider_project_id(&self) -> Option<&str> {
        self.config.get("project_id").and_then(|v| v.as_str())
    }

    /// Branch override for commit-sourced rows.
    pub fn branch(&self) -> Option<&str> {
        self.config.get("branch").and_then(|v| v.as_str())
    }
}
