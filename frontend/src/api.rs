use async_trait::async_trait;
use chat_client::models::{SendMessageRequest, SendMessageResponse};
use chat_client::{ApiError, ChatApi};
use gloo_net::http::Request;
use serde::Deserialize;

/// Base URL of the backend API server.
pub const API_BASE: &str = "http://localhost:8080";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(default)]
    retry_after_ms: Option<u64>,
}

/// `ChatApi` over HTTP using gloo-net.
pub struct HttpChatApi;

#[async_trait(?Send)]
impl ChatApi for HttpChatApi {
    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<SendMessageResponse, ApiError> {
        let resp = Request::post(&format!("{API_BASE}/api/chat"))
            .json(request)
            .map_err(|e| ApiError::Decode(format!("Serialize error: {e}")))?
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if resp.status() == 429 {
            let body = resp.json::<ErrorBody>().await.ok();
            return Err(ApiError::RateLimited {
                message: body
                    .as_ref()
                    .map(|b| b.error.clone())
                    .unwrap_or_else(|| "Too many requests".to_string()),
                retry_after_ms: body.and_then(|b| b.retry_after_ms),
            });
        }

        if !resp.ok() {
            let status = resp.status();
            let message = match resp.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => resp.status_text(),
            };
            return Err(ApiError::Server { status, message });
        }

        resp.json::<SendMessageResponse>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Active reachability probe against the health endpoint.
pub async fn probe_health() -> bool {
    match Request::get(&format!("{API_BASE}/api/health")).send().await {
        Ok(resp) => resp.ok(),
        Err(e) => {
            log::debug!("Health probe failed: {e}");
            false
        }
    }
}
