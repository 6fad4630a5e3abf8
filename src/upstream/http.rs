use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use super::{ChatTurn, CompletionBackend, CompletionRequest, UpstreamError};

const REQUEST_ID_HEADER: &str = "X-Request-Id";
const ATTEMPT_HEADER: &str = "X-Attempt-Number";

#[derive(Serialize)]
struct CompletionBody<'a> {
    messages: &'a [ChatTurn],
}

/// Calls a JSON completion endpoint: `POST {messages}` answered by `{completion}`.
#[derive(Clone)]
pub struct HttpCompletionBackend {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl HttpCompletionBackend {
    pub fn new(url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            model: model.to_string(),
        }
    }
}

/// Pulls the `completion` string out of an upstream response body.
fn extract_completion(body: &Value) -> Result<String, UpstreamError> {
    body.get("completion")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(UpstreamError::MissingCompletion)
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    fn endpoint(&self) -> &str {
        &self.url
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
        debug!(
            "POST {} request_id={} attempt={} turns={}",
            self.url,
            request.request_id,
            request.attempt,
            request.messages.len()
        );

        let response = self
            .client
            .post(&self.url)
            .header(REQUEST_ID_HEADER, &request.request_id)
            .header(ATTEMPT_HEADER, request.attempt.to_string())
            .json(&CompletionBody { messages: &request.messages })
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Completion endpoint {} returned {status}", self.url);
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|_| UpstreamError::MissingCompletion)?;
        extract_completion(&body)
    }
}
