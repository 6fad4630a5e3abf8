use async_trait::async_trait;
use rig::client::Nothing;
use rig::completion::Chat;
use rig::message::Message as RigMessage;
use rig::prelude::CompletionClient;
use rig::providers::ollama;
use tracing::error;

use super::{ChatTurn, CompletionBackend, CompletionRequest, UpstreamError, SYSTEM_PREAMBLE};
use crate::models::MessageRole;

/// Splits a context window into the rig preamble, replayed history and the prompt.
fn split_turns(turns: &[ChatTurn]) -> (String, Vec<RigMessage>, String) {
    let preamble = turns
        .iter()
        .find(|t| t.role == MessageRole::System)
        .map(|t| t.content.clone())
        .unwrap_or_else(|| SYSTEM_PREAMBLE.to_string());

    let (prompt, rest) = match turns.split_last() {
        Some((last, rest)) if last.role == MessageRole::User => (last.content.clone(), rest),
        _ => (String::new(), turns),
    };

    let history = rest
        .iter()
        .filter_map(|t| match t.role {
            MessageRole::User => Some(RigMessage::user(&t.content)),
            MessageRole::Assistant => Some(RigMessage::assistant(&t.content)),
            MessageRole::System => None, // carried by the preamble
        })
        .collect();

    (preamble, history, prompt)
}

/// Completion backend that talks to a local Ollama server through rig.
/// A fresh agent is built per attempt so the preamble always matches the request.
#[derive(Clone)]
pub struct OllamaBackend {
    client: ollama::Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str) -> Result<Self, UpstreamError> {
        let client = ollama::Client::builder()
            .api_key(Nothing)
            .base_url(base_url)
            .build()
            .map_err(|e| UpstreamError::Transport(format!("failed to build Ollama client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
        let (preamble, history, prompt) = split_turns(&request.messages);
        let agent = self.client.agent(&self.model).preamble(&preamble).build();

        agent.chat(prompt.as_str(), history).await.map_err(|e| {
            error!("Ollama inference failed (request {}): {e}", request.request_id);
            let msg = e.to_string();
            if msg.contains("Connection refused") || msg.contains("connect") {
                UpstreamError::Transport(format!("Ollama unreachable at {}: {msg}", self.base_url))
            } else {
                UpstreamError::Status { status: 502, body: msg }
            }
        })
    }
}
