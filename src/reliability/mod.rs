//! Resilience wrapper around the upstream completion call.
//!
//! `send` runs rate limiting, idempotency lookup, the circuit breaker check and a
//! retrying upstream call, in that order. Only `RateLimited` escapes as an error;
//! every upstream failure resolves to a fallback response.

pub mod backoff;
pub mod circuit_breaker;
pub mod idempotency;
pub mod rate_limiter;

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::ReliabilityConfig;
use crate::errors::AppError;
use crate::fallback::{fallback, ErrorCategory, FALLBACK_MODEL};
use crate::models::{
    BreakerSnapshot, Message, MessageRole, ResponseMetadata, SendMessageResponse,
};
use crate::upstream::{build_context, ChatTurn, CompletionBackend, CompletionRequest, UpstreamError};

use backoff::Backoff;
use circuit_breaker::CircuitBreakers;
use idempotency::IdempotencyCache;
use rate_limiter::{Admission, RateLimiter};

/// Process-wide reliability state. Build once and share behind an `Arc`.
pub struct ReliabilityLayer {
    backend: Arc<dyn CompletionBackend>,
    clock: Arc<dyn Clock>,
    config: ReliabilityConfig,
    backoff: Backoff,
    rate_limiter: RateLimiter,
    idempotency: IdempotencyCache,
    breakers: CircuitBreakers,
}

impl ReliabilityLayer {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        clock: Arc<dyn Clock>,
        config: ReliabilityConfig,
    ) -> Self {
        let backoff = Backoff {
            base_ms: config.backoff_base.as_millis() as u64,
            max_jitter_ms: config.backoff_max_jitter.as_millis() as u64,
        };
        Self {
            rate_limiter: RateLimiter::new(
                config.rate_limit_max,
                config.rate_limit_window.as_millis() as i64,
            ),
            idempotency: IdempotencyCache::new(),
            breakers: CircuitBreakers::new(
                config.breaker_threshold,
                config.breaker_cooldown.as_millis() as i64,
            ),
            backend,
            clock,
            config,
            backoff,
        }
    }

    /// Produces an assistant reply for `message`, degrading to a fallback when the
    /// upstream cannot be used.
    pub async fn send(
        &self,
        conversation_id: &str,
        message: &str,
        history: &[Message],
        idempotency_key: Option<&str>,
    ) -> Result<SendMessageResponse, AppError> {
        let started = Instant::now();
        let now = self.clock.now_ms();

        // ── Rate limit ────────────────────────────────────────────────────────
        if let Admission::Rejected { retry_after_ms } =
            self.rate_limiter.check(conversation_id, now)
        {
            warn!("Rate limit hit for conversation {conversation_id}");
            return Err(AppError::RateLimited {
                conversation_id: conversation_id.to_string(),
                retry_after_ms,
            });
        }

        // ── Idempotency ───────────────────────────────────────────────────────
        if let Some(key) = idempotency_key {
            if let Some(cached) = self.idempotency.get(key, now) {
                debug!("Idempotency hit for key {key}");
                return Ok(cached);
            }
        }

        // ── Circuit breaker ───────────────────────────────────────────────────
        let endpoint = self.backend.endpoint().to_string();
        if self.breakers.is_open(&endpoint, now) {
            warn!("Circuit open for {endpoint}, answering conversation {conversation_id} with fallback");
            let reason = format!("circuit breaker open for {endpoint}");
            return Ok(self.fallback_response(conversation_id, message, &reason, started));
        }

        // ── Upstream call ─────────────────────────────────────────────────────
        let context = build_context(history, message, self.config.context_window);
        match self.complete_with_retry(&context).await {
            Ok(completion) => {
                self.breakers.record_success(&endpoint);
                let response = self.success_response(conversation_id, completion, started);
                if let Some(key) = idempotency_key {
                    self.remember(key, &response, self.config.idempotency_ttl.as_millis() as i64);
                }
                Ok(response)
            }
            Err(err) => {
                self.breakers.record_failure(&endpoint, self.clock.now_ms());
                warn!("Upstream exhausted for conversation {conversation_id}: {err}");
                let response =
                    self.fallback_response(conversation_id, message, &err.to_string(), started);
                if let Some(key) = idempotency_key {
                    self.remember(key, &response, self.config.fallback_ttl.as_millis() as i64);
                }
                Ok(response)
            }
        }
    }

    async fn complete_with_retry(&self, context: &[ChatTurn]) -> Result<String, UpstreamError> {
        let max_attempts = self.config.max_attempts.max(1);
        let timeout = self.config.attempt_timeout;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.backoff.delay(attempt - 1);
                warn!("Retrying upstream ({attempt}/{max_attempts}) after {}ms", delay.as_millis());
                tokio::time::sleep(delay).await;
            }

            let request = CompletionRequest {
                messages: context.to_vec(),
                request_id: Uuid::new_v4().to_string(),
                attempt,
            };

            match tokio::time::timeout(timeout, self.backend.complete(&request)).await {
                Ok(Ok(completion)) => return Ok(completion),
                Ok(Err(err)) => {
                    warn!("Upstream attempt {attempt} ({}) failed: {err}", request.request_id);
                    last_error = Some(err);
                }
                Err(_) => {
                    warn!("Upstream attempt {attempt} ({}) timed out", request.request_id);
                    last_error = Some(UpstreamError::Timeout(timeout.as_millis() as u64));
                }
            }
        }

        Err(last_error.unwrap_or(UpstreamError::MissingCompletion))
    }

    fn remember(&self, key: &str, response: &SendMessageResponse, ttl_ms: i64) {
        let mut snapshot = response.clone();
        snapshot.metadata.cached = true;
        self.idempotency.put(key, snapshot, self.clock.now_ms(), ttl_ms);
    }

    fn success_response(
        &self,
        conversation_id: &str,
        completion: String,
        started: Instant,
    ) -> SendMessageResponse {
        let tokens_used = (completion.chars().count() as u32).div_ceil(4);
        SendMessageResponse {
            success: true,
            message: Message::new(MessageRole::Assistant, completion, self.clock.now_ms()),
            conversation_id: conversation_id.to_string(),
            metadata: ResponseMetadata {
                processing_time: started.elapsed().as_millis() as u64,
                model: self.backend.model_id().to_string(),
                tokens_used,
                cached: false,
                endpoint: self.backend.endpoint().to_string(),
                error: None,
            },
        }
    }

    fn fallback_response(
        &self,
        conversation_id: &str,
        user_message: &str,
        reason: &str,
        started: Instant,
    ) -> SendMessageResponse {
        let category = ErrorCategory::classify(reason);
        SendMessageResponse {
            success: true,
            message: Message::new(
                MessageRole::Assistant,
                fallback(user_message, Some(reason)),
                self.clock.now_ms(),
            ),
            conversation_id: conversation_id.to_string(),
            metadata: ResponseMetadata {
                processing_time: started.elapsed().as_millis() as u64,
                model: FALLBACK_MODEL.to_string(),
                tokens_used: 0,
                cached: false,
                endpoint: self.backend.endpoint().to_string(),
                error: Some(format!("{}: {reason}", category.describe())),
            },
        }
    }

    /// Evicts expired idempotency entries and stale rate-limit windows.
    pub fn sweep(&self) {
        let now = self.clock.now_ms();
        let cache = self.idempotency.sweep(now);
        let windows = self.rate_limiter.sweep(now);
        if cache + windows > 0 {
            info!("Swept {cache} idempotency entries and {windows} rate-limit windows");
        }
    }

    pub fn cache_size(&self) -> usize {
        self.idempotency.len()
    }

    pub fn rate_limit_entries(&self) -> usize {
        self.rate_limiter.len()
    }

    pub fn circuit_breakers(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshot()
    }
}
