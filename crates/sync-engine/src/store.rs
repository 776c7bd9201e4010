//! Dedup/upsert store: the only writer of `deployments` rows.
//!
//! Every cross-invocation guarantee (idempotence, status monotonicity) is
//! enforced here through a single atomic conditional insert. The poll and
//! webhook paths run concurrently under a stateless execution model, so a
//! read-then-write sequence would race; the conflict clause is the
//! serialization point.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres, Row};
use uuid::Uuid;

use crate::models::{Deployment, DeploymentStatus};

/// Identity of a physical provider event. Always scoped to one project;
/// dedup never crosses `project_id`.
#[derive(Debug, Clone)]
pub enum DedupKey {
    /// Provider-assigned deployment id (build-provider sourced rows).
    External { project_id: Uuid, external_id: String },
    /// Commit hash (source-control sourced rows, no provider id available).
    Commit { project_id: Uuid, commit_hash: String },
}

/// Candidate fields for an observed event. The store decides whether they
/// create a row, update one, or are dropped as a duplicate.
#[derive(Debug, Clone)]
pub struct NewDeployment {
    pub commit_hash: Option<String>,
    pub commit_message: Option<String>,
    pub branch: Option<String>,
    pub environment: String,
    pub status: DeploymentStatus,
    pub duration_seconds: Option<i32>,
    pub cost: Option<f64>,
    pub created_at: DateTime<Utc>,
}

const DEPLOYMENT_COLUMNS: &str =
    "id, project_id, external_id, commit_hash, commit_message, branch, environment, status, duration_seconds, cost, created_at, resolved_at";

/// Idempotent upsert keyed by `key`. Returns the canonical row and whether
/// this call created it.
///
/// Externally-keyed events update non-terminal rows in place (a later
/// observation may carry the resolved status, duration and cost) but a row
/// whose status is already `success` or `failed` is frozen: the conflicting
/// update is rejected inside the statement and the existing row is returned
/// unchanged. Commit-keyed events are strict insert-or-ignore.
pub async fn upsert(
    pool: &Pool<Postgres>,
    key: &DedupKey,
    candidate: NewDeployment,
) -> Result<(Deployment, bool), sqlx::Error> {
    match key {
        DedupKey::External { project_id, external_id } => {
            let sql = format!(
                "INSERT INTO deployments (project_id, external_id, commit_hash, commit_message, branch, environment, status, duration_seconds, cost, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                 ON CONFLICT (project_id, external_id) WHERE external_id IS NOT NULL DO UPDATE SET \
                   status = EXCLUDED.status, \
                   duration_seconds = COALESCE(EXCLUDED.duration_seconds, deployments.duration_seconds), \
                   cost = COALESCE(EXCLUDED.cost, deployments.cost), \
                   commit_hash = COALESCE(EXCLUDED.commit_hash, deployments.commit_hash), \
                   commit_message = COALESCE(EXCLUDED.commit_message, deployments.commit_message), \
                   branch = COALESCE(EXCLUDED.branch, deployments.branch) \
                 WHERE deployments.status NOT IN ('success', 'failed') \
                 RETURNING {DEPLOYMENT_COLUMNS}, (xmax = 0) AS was_created"
            );
            let row = sqlx::query(&sql)
                .bind(project_id)
                .bind(external_id)
                .bind(&candidate.commit_hash)
                .bind(&candidate.commit_message)
                .bind(&candidate.branch)
                .bind(&candidate.environment)
                .bind(candidate.status)
                .bind(candidate.duration_seconds)
                .bind(candidate.cost)
                .bind(candidate.created_at)
                .fetch_optional(pool)
                .await?;
            match row {
                Some(row) => {
                    let was_created: bool = row.try_get("was_created")?;
                    Ok((Deployment::from_row(&row)?, was_created))
                }
                // Conflict hit a terminal row; the update predicate rejected
                // it. Return the frozen row as-is.
                None => {
                    let existing = sqlx::query_as::<_, Deployment>(&format!(
                        "SELECT {DEPLOYMENT_COLUMNS} FROM deployments WHERE project_id = $1 AND external_id = $2"
                    ))
                    .bind(project_id)
                    .bind(external_id)
                    .fetch_one(pool)
                    .await?;
                    Ok((existing, false))
                }
            }
        }
        DedupKey::Commit { project_id, commit_hash } => {
            let sql = format!(
                "INSERT INTO deployments (project_id, external_id, commit_hash, commit_message, branch, environment, status, duration_seconds, cost, created_at) \
                 VALUES ($1, NULL, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (project_id, commit_hash) WHERE external_id IS NULL DO NOTHING \
                 RETURNING {DEPLOYMENT_COLUMNS}"
            );
            let row = sqlx::query_as::<_, Deployment>(&sql)
                .bind(project_id)
                .bind(commit_hash)
                .bind(&candidate.commit_message)
                .bind(&candidate.branch)
                .bind(&candidate.environment)
                .bind(candidate.status)
                .bind(candidate.duration_seconds)
                .bind(candidate.cost)
                .bind(candidate.created_at)
                .fetch_optional(pool)
                .await?;
            match row {
                Some(created) => Ok((created, true)),
                None => {
                    let existing = sqlx::query_as::<_, Deployment>(&format!(
                        "SELECT {DEPLOYMENT_COLUMNS} FROM deployments WHERE project_id = $1 AND commit_hash = $2 AND external_id IS NULL"
                    ))
                    .bind(project_id)
                    .bind(commit_hash)
                    .fetch_one(pool)
                    .await?;
                    Ok((existing, false))
                }
            }
        }
    }
}

pub async fn get(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<Deployment>, sqlx::Error> {
    sqlx::query_as::<_, Deployment>(&format!(
        "SELECT {DEPLOYMENT_COLUMNS} FROM deployments WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list(
    pool: &Pool<Postgres>,
    project_id: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Deployment>, sqlx::Error> {
    match project_id {
        Some(pid) => {
            sqlx::query_as::<_, Deployment>(&format!(
                "SELECT {DEPLOYMENT_COLUMNS} FROM deployments WHERE project_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
            ))
            .bind(pid)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, Deployment>(&format!(
                "SELECT {DEPLOYMENT_COLUMNS} FROM deployments ORDER BY created_at DESC LIMIT $1 OFFSET $2"
            ))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
    }
}
