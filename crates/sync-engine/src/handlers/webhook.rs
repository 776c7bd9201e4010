//! Build-provider webhook adapter. Deliveries are at-least-once and may
//! arrive out of order relative to polling; both paths funnel through the
//! same dedup store upsert, so whichever observer arrives first creates the
//! row and the other is a no-op (or a monotonic update).

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cost;
use crate::error::{ApiError, ApiResult};
use crate::normalize::normalize_webhook_event;
use crate::providers::vercel::VercelMeta;
use crate::store::{self, DedupKey, NewDeployment};
use crate::telemetry::WEBHOOK_EVENTS;
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "x-vercel-signature";

#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: WebhookPayload,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookPayload {
    #[serde(rename = "projectId")]
    pub project_id: String,
    pub deployment: WebhookDeployment,
    pub target: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookDeployment {
    pub id: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub meta: VercelMeta,
    pub created: i64,
    pub ready: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub ignored: bool,
    pub deployment_id: Option<Uuid>,
    pub created: bool,
}

/// Inbound signed deployment lifecycle event.
#[utoipa::path(post, path = "/webhooks/vercel", request_body = WebhookEnvelope, responses(
    (status = 200, body = WebhookAck),
    (status = 401, description = "signature missing or invalid"),
    (status = 422, description = "unknown provider project id")
))]
#[tracing::instrument(level = "info", skip(state, headers, body))]
pub async fn vercel_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    if let Some(secret) = &state.cfg.webhook_secret {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(ApiError::invalid_signature)?;
        if !verify_signature(secret.as_bytes(), &body, provided) {
            WEBHOOK_EVENTS.with_label_values(&["unknown", "bad_signature"]).inc();
            return Err(ApiError::invalid_signature());
        }
    } else {
        tracing::warn!("webhook secret not configured, accepting unsigned delivery");
    }

    let envelope: WebhookEnvelope = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("malformed webhook body: {e}")))?;

    let Some(status) = normalize_webhook_event(&envelope.event_type) else {
        WEBHOOK_EVENTS.with_label_values(&[envelope.event_type.as_str(), "ignored"]).inc();
        return Ok(Json(WebhookAck { ignored: true, deployment_id: None, created: false }));
    };

    // Explicit provider-project-id mapping, maintained at integration
    // creation time. A miss means a stale or misconfigured integration;
    // never silently create an orphan row.
    let project_id: Option<Uuid> = sqlx::query_scalar(
        "SELECT project_id FROM integrations WHERE provider = 'vercel' AND config->>'project_id' = $1",
    )
    .bind(&envelope.payload.project_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(format!("integration lookup failed: {e}")))?;
    let Some(project_id) = project_id else {
        WEBHOOK_EVENTS.with_label_values(&[envelope.event_type.as_str(), "unknown_project"]).inc();
        return Err(ApiError::unknown_project(&envelope.payload.project_id));
    };

    let dep = &envelope.payload.deployment;
    let duration = cost::duration_seconds(dep.created, dep.ready);
    let candidate = NewDeployment {
        commit_hash: dep.meta.commit_sha.clone(),
        commit_message: dep.meta.commit_message.clone(),
        branch: dep.meta.commit_ref.clone(),
        environment: envelope.payload.target.clone().unwrap_or_else(|| "production".to_string()),
        status,
        duration_seconds: duration,
        cost: duration.map(|secs| cost::estimate_cost(secs, state.cfg.build_rate_per_min)),
        created_at: chrono::DateTime::from_timestamp_millis(dep.created).unwrap_or_else(chrono::Utc::now),
    };
    let key = DedupKey::External { project_id, external_id: dep.id.clone() };
    let (row, created) = store::upsert(&state.db, &key, candidate)
        .await
        .map_err(|e| ApiError::internal(format!("upsert failed: {e}")))?;

    WEBHOOK_EVENTS
        .with_label_values(&[envelope.event_type.as_str(), if created { "created" } else { "deduped" }])
        .inc();
    tracing::info!(
        deployment_id = %row.id,
        external_id = %dep.id,
        status = %row.status,
        created,
        "webhook event applied"
    );
    Ok(Json(WebhookAck { ignored: false, deployment_id: Some(row.id), created }))
}

fn verify_signature(secret: &[u8], body: &[u8], provided_hex: &str) -> bool {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret) else { return false };
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());
    ct_equal(&expected, provided_hex)
}

// Constant-time equality
fn ct_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() { return false; }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) { diff |= x ^ y; }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_roundtrip() {
        let secret = b"hook-secret";
        let body = br#"{"type":"deployment.ready"}"#;
        let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());
        assert!(verify_signature(secret, body, &sig));
        assert!(!verify_signature(secret, body, "deadbeef"));
        assert!(!verify_signature(b"other-secret", body, &sig));
    }
}
