use async_trait::async_trait;
use thiserror::Error;

use crate::models::{SendMessageRequest, SendMessageResponse};

/// Failure of one `sendMessage` call as seen by the client.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never reached the server.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {message}")]
    RateLimited { message: String, retry_after_ms: Option<u64> },

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Parse error: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

/// The remote `sendMessage` call.
#[async_trait(?Send)]
pub trait ChatApi {
    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<SendMessageResponse, ApiError>;
}
