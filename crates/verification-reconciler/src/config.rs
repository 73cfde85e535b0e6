//! Configuration management for the verification reconciler

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis URL for the verification store
    pub redis_url: String,

    /// Host the API binds to
    pub host: String,

    /// Port the API binds to
    pub port: String,

    /// Base URL of the external verification provider
    pub provider_url: String,

    /// Optional API key sent to the provider
    pub provider_api_key: Option<String>,

    /// Seconds between reconciliation sweeps
    pub poll_interval_secs: u64,

    /// Run against the in-memory store and mock provider instead of
    /// Redis and the real provider
    pub mock_mode: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let host = std::env::var("RECONCILER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("RECONCILER_PORT").unwrap_or_else(|_| "8086".to_string());
        let provider_url = std::env::var("PROVIDER_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:9090".to_string());
        let provider_api_key = std::env::var("PROVIDER_API_KEY").ok();

        let poll_interval_secs = std::env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);

        let mock_mode = std::env::var("MOCK_MODE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            redis_url,
            host,
            port,
            provider_url,
            provider_api_key,
            poll_interval_secs,
            mock_mode,
        }
    }
}
