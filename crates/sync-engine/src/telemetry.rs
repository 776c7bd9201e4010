use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{opts, Encoder, IntCounter, IntCounterVec, Registry, TextEncoder};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static HTTP_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        opts!("http_requests_total", "HTTP request count"),
        &["method", "path", "status"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static SYNC_RUNS: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("sync_runs_total", "Orchestrator runs").unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static INTEGRATION_SYNC_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        opts!("integration_sync_failures_total", "Per-integration sync failures"),
        &["provider"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static WEBHOOK_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        opts!("webhook_events_total", "Inbound webhook deliveries"),
        &["event_type", "outcome"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static DEPLOYMENTS_UPSERTED: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        opts!("deployments_upserted_total", "Upsert outcomes by source"),
        &["source", "outcome"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&metric_families, &mut buf).is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([("Content-Type", "text/plain; version=0.0.4")], buf).into_response()
}

/// Collapse id-bearing path segments so metric label cardinality stays bounded.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if seg.is_empty() {
                seg.to_string()
            } else if uuid::Uuid::parse_str(seg).is_ok() || seg.chars().all(|c| c.is_ascii_digit()) {
                ":id".to_string()
            } else {
                seg.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
