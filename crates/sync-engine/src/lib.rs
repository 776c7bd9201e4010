pub mod config;
pub mod cost;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod services;
pub mod store;
pub mod telemetry;
pub mod test_support;

use std::sync::Arc;

use axum::{routing::{delete, get, post}, Router};
use sqlx::{Pool, Postgres};
use utoipa::OpenApi;

use crate::config::Config;
use crate::handlers::{
    deployments::{deployment_logs, list_deployments},
    health::{health, readiness},
    integrations::{link_integration, list_integrations, unlink_integration},
    sync::run_sync,
    webhook::vercel_webhook,
};
use crate::telemetry::metrics_handler;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub cfg: Arc<Config>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(db: Pool<Postgres>, cfg: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.provider_timeout)
            .build()?;
        Ok(Self { db, cfg: Arc::new(cfg), http })
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::health::readiness,
        handlers::sync::run_sync,
        handlers::webhook::vercel_webhook,
        handlers::deployments::list_deployments,
        handlers::deployments::deployment_logs,
        handlers::integrations::link_integration,
        handlers::integrations::list_integrations,
        handlers::integrations::unlink_integration,
    ),
    components(schemas(
        error::ApiErrorBody,
        models::Deployment,
        models::Integration,
        models::DeploymentStatus,
        models::Provider,
        models::IntegrationStatus,
    )),
    tags( (name = "shipwatch", description = "Shipwatch deployment reconciliation API") )
)]
pub struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let openapi = ApiDoc::openapi();
    Router::new()
        .route("/health", get(health))
        .route("/readyz", get(readiness))
        .route("/metrics", get(metrics_handler))
        .route("/sync", post(run_sync))
        .route("/webhooks/vercel", post(vercel_webhook))
        .route("/deployments", get(list_deployments))
        .route("/deployments/:id/logs", get(deployment_logs))
        .route("/integrations", post(link_integration).get(list_integrations))
        .route("/integrations/:id", delete(unlink_integration))
        .route("/openapi.json", get(|| async move { axum::Json(openapi.clone()) }))
        .with_state(state)
}
