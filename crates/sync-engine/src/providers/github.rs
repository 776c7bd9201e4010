//! Source-control adapter: polls recent commit history and records each
//! unseen commit as a deployment row keyed by `(project_id, commit_hash)`.
//!
//! Raw commit history carries no build outcome, so rows from this path get
//! the explicit `unknown` status rather than a guessed one.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{Pool, Postgres};
use tracing::debug;

use crate::error::SyncError;
use crate::models::{DeploymentStatus, Integration};
use crate::providers::{check_status, transport_error};
use crate::store::{self, DedupKey, NewDeployment};

/// How many commits to pull per sync run.
pub const COMMIT_FETCH_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct Repo {
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RepoCommit {
    pub sha: String,
    pub commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
pub struct CommitDetail {
    pub message: String,
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
pub struct CommitAuthor {
    pub date: Option<DateTime<Utc>>,
}

pub struct GithubClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl GithubClient {
    pub fn new(http: reqwest::Client, base: impl Into<String>, token: impl Into<String>) -> Self {
        Self { http, base: base.into(), token: token.into() }
    }

    /// Most recently pushed repository visible to the credential.
    pub async fn most_recent_repo(&self) -> Result<Option<Repo>, SyncError> {
        let resp = self
            .http
            .get(format!("{}/user/repos", self.base))
            .query(&[("sort", "updated"), ("per_page", "1")])
            .bearer_auth(&self.token)
            .header(reqwest::header::USER_AGENT, "shipwatch-sync-engine")
            .send()
            .await
            .map_err(transport_error)?;
        let mut repos: Vec<Repo> = check_status(resp).await?.json().await.map_err(transport_error)?;
        Ok(if repos.is_empty() { None } else { Some(repos.remove(0)) })
    }

    pub async fn recent_commits(&self, full_name: &str, limit: usize) -> Result<Vec<RepoCommit>, SyncError> {
        let resp = self
            .http
            .get(format!("{}/repos/{}/commits", self.base, full_name))
            .query(&[("per_page", limit.to_string())])
            .bearer_auth(&self.token)
            .header(reqwest::header::USER_AGENT, "shipwatch-sync-engine")
            .send()
            .await
            .map_err(transport_error)?;
        check_status(resp).await?.json().await.map_err(transport_error)
    }
}

/// Sync one GitHub-linked integration. Returns the number of rows created;
/// already-seen commits are no-ops.
pub async fn sync_integration(
    pool: &Pool<Postgres>,
    client: &GithubClient,
    integration: &Integration,
) -> Result<u32, SyncError> {
    let Some(repo) = client.most_recent_repo().await? else {
        debug!(integration_id = %integration.id, "no repositories visible to credential");
        return Ok(0);
    };
    let commits = client.recent_commits(&repo.full_name, COMMIT_FETCH_LIMIT).await?;
    let branch = integration.branch().unwrap_or("main").to_string();
    let mut created = 0u32;
    for commit in commits {
        let key = DedupKey::Commit {
            project_id: integration.project_id,
            commit_hash: commit.sha.clone(),
        };
        let message = commit.commit.message.lines().next().unwrap_or_default().to_string();
        let created_at = commit
            .commit
            .author
            .and_then(|a| a.date)
            .unwrap_or_else(Utc::now);
        let candidate = NewDeployment {
            commit_hash: Some(commit.sha),
            commit_message: Some(message),
            branch: Some(branch.clone()),
            environment: "production".to_string(),
            status: DeploymentStatus::Unknown,
            duration_seconds: None,
            cost: None,
            created_at,
        };
        let (_, was_created) = store::upsert(pool, &key, candidate).await?;
        crate::telemetry::DEPLOYMENTS_UPSERTED
            .with_label_values(&["github", if was_created { "created" } else { "deduped" }])
            .inc();
        if was_created {
            created += 1;
        }
    }
    debug!(integration_id = %integration.id, repo = %repo.full_name, created, "github sync complete");
    Ok(created)
}
