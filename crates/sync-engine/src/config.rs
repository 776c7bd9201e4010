use std::time::Duration;

/// Runtime configuration, read once from the environment at startup.
/// Everything here is deliberately plain data so tests can construct a
/// `Config` pointing at fixture servers.
#[derive(Debug, Clone)]
pub struct Config {
    /// Build cost rate in dollars per build minute.
    pub build_rate_per_min: f64,
    /// Shared secret for webhook HMAC verification. When unset, signature
    /// checks are skipped (local development only).
    pub webhook_secret: Option<String>,
    pub github_api_base: String,
    pub vercel_api_base: String,
    /// Timeout applied to every outbound provider request.
    pub provider_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            build_rate_per_min: 0.01,
            webhook_secret: None,
            github_api_base: "https://api.github.com".to_string(),
            vercel_api_base: "https://api.vercel.com".to_string(),
            provider_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            build_rate_per_min: std::env::var("SHIPWATCH_BUILD_RATE_PER_MIN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.build_rate_per_min),
            webhook_secret: std::env::var("SHIPWATCH_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            github_api_base: std::env::var("SHIPWATCH_GITHUB_API_BASE")
                .unwrap_or(defaults.github_api_base),
            vercel_api_base: std::env::var("SHIPWATCH_VERCEL_API_BASE")
                .unwrap_or(defaults.vercel_api_base),
            provider_timeout: std::env::var("SHIPWATCH_PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.provider_timeout),
        }
    }
}
