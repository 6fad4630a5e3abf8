use std::sync::Arc;
use std::time::Instant;

use crate::errors::AppError;
use crate::models::{HealthStatus, SendMessageRequest, SendMessageResponse};
use crate::reliability::ReliabilityLayer;

const MAX_MESSAGE_LENGTH: usize = 8000;

/// RPC-facing service: validates requests and hands them to the reliability layer.
#[derive(Clone)]
pub struct ChatService {
    reliability: Arc<ReliabilityLayer>,
    started: Instant,
}

impl ChatService {
    pub fn new(reliability: Arc<ReliabilityLayer>) -> Self {
        Self { reliability, started: Instant::now() }
    }

    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<SendMessageResponse, AppError> {
        // ── Validation ────────────────────────────────────────────────────────
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::EmptyField { field_name: "message".to_string() });
        }
        let length = message.chars().count();
        if length > MAX_MESSAGE_LENGTH {
            return Err(AppError::FieldTooLong {
                field_name: "message".to_string(),
                max_length: MAX_MESSAGE_LENGTH,
                actual_length: length,
            });
        }
        if request.conversation_id.trim().is_empty() {
            return Err(AppError::EmptyField { field_name: "conversationId".to_string() });
        }

        self.reliability
            .send(
                &request.conversation_id,
                message,
                &request.messages,
                request.idempotency_key.as_deref(),
            )
            .await
    }

    pub fn health_status(&self) -> HealthStatus {
        HealthStatus {
            cache_size: self.reliability.cache_size(),
            rate_limit_entries: self.reliability.rate_limit_entries(),
            circuit_breakers: self.reliability.circuit_breakers(),
            uptime: self.started.elapsed().as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ReliabilityConfig;
    use crate::upstream::{CompletionBackend, CompletionRequest, UpstreamError};
    use async_trait::async_trait;

    struct EchoBackend;

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        fn endpoint(&self) -> &str {
            "echo"
        }

        fn model_id(&self) -> &str {
            "echo-1"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
            Ok(request.messages.last().map(|t| t.content.clone()).unwrap_or_default())
        }
    }

    fn service() -> ChatService {
        let layer = ReliabilityLayer::new(
            Arc::new(EchoBackend),
            Arc::new(ManualClock::new(0)),
            ReliabilityConfig::default(),
        );
        ChatService::new(Arc::new(layer))
    }

    fn request(message: &str) -> SendMessageRequest {
        SendMessageRequest {
            conversation_id: "conv-1".to_string(),
            message: message.to_string(),
            messages: vec![],
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn test_rejects_blank_message() {
        let err = service().send_message(request("   ")).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_rejects_oversized_message() {
        let err = service().send_message(request(&"x".repeat(8001))).await.unwrap_err();
        assert!(matches!(err, AppError::FieldTooLong { actual_length: 8001, .. }));
    }

    #[tokio::test]
    async fn test_sends_trimmed_message() {
        let response = service().send_message(request("  ping  ")).await.unwrap();
        assert_eq!(response.message.content, "ping");
        assert_eq!(response.metadata.model, "echo-1");
    }

    #[tokio::test]
    async fn test_health_reports_state() {
        let svc = service();
        let mut req = request("ping");
        req.idempotency_key = Some("msg-1".to_string());
        svc.send_message(req).await.unwrap();

        let health = svc.health_status();
        assert_eq!(health.cache_size, 1);
        assert_eq!(health.rate_limit_entries, 1);
        assert!(health.circuit_breakers.is_empty());
    }
}
