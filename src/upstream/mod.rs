pub mod http;
pub mod ollama;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Message, MessageRole};

pub use http::HttpCompletionBackend;
pub use ollama::OllamaBackend;

pub const SYSTEM_PREAMBLE: &str = "You are a helpful AI assistant. \
                                   Be concise, accurate, and friendly. \
                                   If you don't know something, say so.";

/// One turn of the context window sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// A single attempt against the upstream completion endpoint.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatTurn>,
    /// Fresh per attempt, sent for traceability.
    pub request_id: String,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Failure of one upstream attempt. Every variant is retryable.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("upstream request timed out after {0}ms")]
    Timeout(u64),

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream response is missing the completion field")]
    MissingCompletion,

    #[error("transport error: {0}")]
    Transport(String),
}

/// The single remote "complete(messages) -> text" call.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Logical endpoint name used to key the circuit breaker.
    fn endpoint(&self) -> &str;

    /// Model id reported in response metadata.
    fn model_id(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError>;
}

/// Builds `[system preamble] + last `window` history entries + current user message`.
///
/// System messages in the history are dropped; the preamble replaces them.
pub fn build_context(history: &[Message], user_message: &str, window: usize) -> Vec<ChatTurn> {
    let prior: Vec<&Message> =
        history.iter().filter(|m| m.role != MessageRole::System).collect();
    let start = prior.len().saturating_sub(window);

    let mut turns = Vec::with_capacity(prior.len() - start + 2);
    turns.push(ChatTurn::new(MessageRole::System, SYSTEM_PREAMBLE));
    turns.extend(prior[start..].iter().map(|m| ChatTurn::new(m.role, m.content.clone())));
    turns.push(ChatTurn::new(MessageRole::User, user_message));
    turns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                let role = if i % 2 == 0 { MessageRole::User } else { MessageRole::Assistant };
                Message::new(role, format!("m{i}"), i as i64)
            })
            .collect()
    }

    #[test]
    fn test_context_keeps_last_window_entries() {
        let turns = build_context(&history(15), "now", 10);
        assert_eq!(turns.len(), 12);
        assert_eq!(turns[0].role, MessageRole::System);
        assert_eq!(turns[1].content, "m5");
        assert_eq!(turns[10].content, "m14");
        assert_eq!(turns[11], ChatTurn::new(MessageRole::User, "now"));
    }

    #[test]
    fn test_context_with_short_history() {
        let turns = build_context(&history(2), "hello", 10);
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec![SYSTEM_PREAMBLE, "m0", "m1", "hello"]);
    }

    #[test]
    fn test_context_drops_system_history() {
        let mut msgs = history(1);
        msgs.push(Message::new(MessageRole::System, "ignored", 5));
        let turns = build_context(&msgs, "q", 10);
        assert_eq!(turns.len(), 3);
        assert!(turns.iter().all(|t| t.content != "ignored"));
    }
}
