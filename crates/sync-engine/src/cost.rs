/// Build duration in whole seconds from provider-reported millisecond
/// timestamps. `None` while the provider has not reported a ready time
/// (deployment still in flight). Clock skew between the two timestamps
/// clamps to zero rather than going negative.
pub fn duration_seconds(created_ms: i64, ready_ms: Option<i64>) -> Option<i32> {
    ready_ms.map(|ready| ((ready - created_ms).max(0) / 1000) as i32)
}

/// Monetary estimate for a build: `(duration / 60) * rate`. The rate is
/// runtime configuration, not a constant, so pricing changes don't require
/// redeploying adapters.
pub fn estimate_cost(duration_seconds: i32, rate_per_minute: f64) -> f64 {
    (f64::from(duration_seconds) / 60.0) * rate_per_minute
}
