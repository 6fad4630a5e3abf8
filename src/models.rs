use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chat message. `timestamp` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: i64,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>, timestamp: i64) -> Self {
        Self { role, content: content.into(), timestamp }
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub message: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Wall time spent producing the response, in milliseconds.
    pub processing_time: u64,
    pub model: String,
    pub tokens_used: u32,
    pub cached: bool,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of `sendMessage`. Degraded answers share this shape and carry
/// `model = "fallback"` plus an `error` diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: Message,
    pub conversation_id: String,
    pub metadata: ResponseMetadata,
}

impl SendMessageResponse {
    pub fn is_fallback(&self) -> bool {
        self.metadata.model == crate::fallback::FALLBACK_MODEL
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub endpoint: String,
    pub is_open: bool,
    pub failures: u32,
    /// Epoch milliseconds of the last recorded failure, if any.
    pub last_failure: Option<i64>,
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub cache_size: usize,
    pub rate_limit_entries: usize,
    pub circuit_breakers: Vec<BreakerSnapshot>,
    /// Seconds since the process started.
    pub uptime: u64,
}
