//! Webhook adapter behavior: signature enforcement, provider project
//! mapping, canonical upsert discipline, and monotonicity against rows the
//! poll path already resolved.

use axum::{body::Body, http::{Request, StatusCode}};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serial_test::serial;
use sha2::Sha256;
use sync_engine::config::Config;
use sync_engine::models::{DeploymentStatus, Provider};
use sync_engine::store::{self, DedupKey, NewDeployment};
use sync_engine::test_support::{create_integration, create_project, state_with};
use sync_engine::{build_router, AppState};
use tower::util::ServiceExt;

const SECRET: &str = "hook-secret";
const CREATED_MS: i64 = 1_740_000_000_000;

fn sign(body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn ready_event(project_id: &str, deployment_id: &str) -> String {
    serde_json::json!({
        "type": "deployment.ready",
        "payload": {
            "projectId": project_id,
            "deployment": {
                "id": deployment_id,
                "meta": {
                    "githubCommitSha": "abc1234",
                    "githubCommitMessage": "ship it",
                    "githubCommitRef": "main"
                },
                "created": CREATED_MS,
                "ready": CREATED_MS + 42_000
            },
            "target": "production"
        }
    })
    .to_string()
}

async fn signed_state() -> AppState {
    let state = state_with(Config {
        webhook_secret: Some(SECRET.to_string()),
        ..Config::default()
    })
    .await;
    let project = create_project(&state.db, "web").await;
    create_integration(
        &state.db,
        project,
        Provider::Vercel,
        serde_json::json!({"token": "tok", "project_id": "prj_123"}),
    )
    .await;
    state
}

fn webhook_request(body: String, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/vercel")
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("x-vercel-signature", sig);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
#[serial]
async fn missing_signature_is_rejected() {
    let state = signed_state().await;
    let app = build_router(state);
    let body = ready_event("prj_123", "dpl_1");
    let res = app.oneshot(webhook_request(body, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn invalid_signature_is_rejected() {
    let state = signed_state().await;
    let pool = state.db.clone();
    let app = build_router(state);
    let body = ready_event("prj_123", "dpl_1");
    let res = app.oneshot(webhook_request(body, Some("deadbeef"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deployments").fetch_one(&pool).await.unwrap();
    assert_eq!(count, 0, "rejected payloads are never processed");
}

#[tokio::test]
#[serial]
async fn valid_ready_event_creates_canonical_row() {
    let state = signed_state().await;
    let pool = state.db.clone();
    let app = build_router(state);
    let body = ready_event("prj_123", "dpl_42");
    let sig = sign(&body);
    let res = app.oneshot(webhook_request(body, Some(&sig))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(res.into_body(), 16 * 1024).await.unwrap();
    let ack: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(ack["ignored"], serde_json::json!(false));
    assert_eq!(ack["created"], serde_json::json!(true));

    let (status, duration, cost): (String, Option<i32>, Option<f64>) = sqlx::query_as(
        "SELECT status, duration_seconds, cost FROM deployments WHERE external_id = 'dpl_42'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(status, "success");
    assert_eq!(duration, Some(42));
    assert!((cost.unwrap() - 0.007).abs() < 1e-9);
}

#[tokio::test]
#[serial]
async fn redelivered_webhook_is_a_noop() {
    let state = signed_state().await;
    let pool = state.db.clone();
    let app = build_router(state);
    let body = ready_event("prj_123", "dpl_42");
    let sig = sign(&body);
    let res = app.clone().oneshot(webhook_request(body.clone(), Some(&sig))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.oneshot(webhook_request(body, Some(&sig))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deployments").fetch_one(&pool).await.unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[serial]
async fn unknown_provider_project_is_a_client_error() {
    let state = signed_state().await;
    let pool = state.db.clone();
    let app = build_router(state);
    let body = ready_event("prj_stale", "dpl_9");
    let sig = sign(&body);
    let res = app.oneshot(webhook_request(body, Some(&sig))).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let bytes = axum::body::to_bytes(res.into_body(), 16 * 1024).await.unwrap();
    let err: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(err["code"], "unknown_project");
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deployments").fetch_one(&pool).await.unwrap();
    assert_eq!(count, 0, "no orphan rows for unmapped projects");
}

#[tokio::test]
#[serial]
async fn unrecognized_event_types_are_acknowledged_and_ignored() {
    let state = signed_state().await;
    let pool = state.db.clone();
    let app = build_router(state);
    let body = serde_json::json!({
        "type": "deployment.check-rerequested",
        "payload": {
            "projectId": "prj_123",
            "deployment": { "id": "dpl_x", "created": CREATED_MS },
            "target": "production"
        }
    })
    .to_string();
    let sig = sign(&body);
    let res = app.oneshot(webhook_request(body, Some(&sig))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(res.into_body(), 16 * 1024).await.unwrap();
    let ack: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(ack["ignored"], serde_json::json!(true));
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deployments").fetch_one(&pool).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[serial]
async fn malformed_body_with_valid_signature_is_bad_request() {
    let state = signed_state().await;
    let app = build_router(state);
    let body = "{not-json".to_string();
    let sig = sign(&body);
    let res = app.oneshot(webhook_request(body, Some(&sig))).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn late_error_webhook_cannot_overturn_polled_success() {
    // Scenario: poll already recorded dpl_555 as success; a deployment.error
    // delivery for the same event arrives afterwards.
    let state = signed_state().await;
    let pool = state.db.clone();
    let project: uuid::Uuid =
        sqlx::query_scalar("SELECT project_id FROM integrations LIMIT 1").fetch_one(&pool).await.unwrap();
    let key = DedupKey::External { project_id: project, external_id: "dpl_555".to_string() };
    store::upsert(
        &pool,
        &key,
        NewDeployment {
            commit_hash: None,
            commit_message: None,
            branch: None,
            environment: "production".to_string(),
            status: DeploymentStatus::Success,
            duration_seconds: Some(42),
            cost: Some(0.007),
            created_at: Utc::now(),
        },
    )
    .await
    .unwrap();

    let app = build_router(state);
    let body = serde_json::json!({
        "type": "deployment.error",
        "payload": {
            "projectId": "prj_123",
            "deployment": { "id": "dpl_555", "created": CREATED_MS },
            "target": "production"
        }
    })
    .to_string();
    let sig = sign(&body);
    let res = app.oneshot(webhook_request(body, Some(&sig))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (status, count): (String, i64) = sqlx::query_as(
        "SELECT status, (SELECT COUNT(*) FROM deployments) FROM deployments WHERE external_id = 'dpl_555'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(status, "success", "terminal status is frozen");
    assert_eq!(count, 1);
}
