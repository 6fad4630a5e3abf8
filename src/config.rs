use std::time::Duration;

use tracing::warn;

/// Tunables for the reliability layer.
#[derive(Debug, Clone)]
pub struct ReliabilityConfig {
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub idempotency_ttl: Duration,
    /// TTL for cached fallback responses; short so a recovered backend is used quickly.
    pub fallback_ttl: Duration,
    pub breaker_threshold: u32,
    pub breaker_cooldown: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max_jitter: Duration,
    pub attempt_timeout: Duration,
    pub context_window: usize,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            rate_limit_max: 15,
            rate_limit_window: Duration::from_secs(60),
            idempotency_ttl: Duration::from_secs(24 * 60 * 60),
            fallback_ttl: Duration::from_secs(5 * 60),
            breaker_threshold: 3,
            breaker_cooldown: Duration::from_secs(30),
            max_attempts: 3,
            backoff_base: Duration::from_millis(1_000),
            backoff_max_jitter: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(30),
            context_window: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    Http,
    Ollama,
}

/// Process configuration, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub upstream_kind: UpstreamKind,
    pub completion_url: String,
    pub ollama_base_url: String,
    pub model_id: String,
    pub sweep_interval: Duration,
    pub reliability: ReliabilityConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let upstream_kind = match lookup("UPSTREAM_KIND").as_deref() {
            None | Some("http") => UpstreamKind::Http,
            Some("ollama") => UpstreamKind::Ollama,
            Some(other) => {
                warn!("Unknown UPSTREAM_KIND '{other}', using http");
                UpstreamKind::Http
            }
        };

        let mut reliability = ReliabilityConfig::default();
        if let Some(max) = lookup("RATE_LIMIT_PER_MINUTE").and_then(|v| v.parse().ok()) {
            reliability.rate_limit_max = max;
        }

        Self {
            port: lookup("PORT").and_then(|p| p.parse().ok()).unwrap_or(8080),
            upstream_kind,
            completion_url: lookup("COMPLETION_URL")
                .unwrap_or_else(|| "http://localhost:11434/api/complete".to_string()),
            ollama_base_url: lookup("OLLAMA_API_BASE_URL")
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            model_id: lookup("MODEL_ID").unwrap_or_else(|| "llama3.2".to_string()),
            sweep_interval: Duration::from_secs(
                lookup("CACHE_SWEEP_INTERVAL_SECS").and_then(|v| v.parse().ok()).unwrap_or(60),
            ),
            reliability,
        }
    }
}
