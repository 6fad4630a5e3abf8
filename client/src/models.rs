use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Matches the server `Message` model. `timestamp` is epoch milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}

impl Message {
    pub fn user(content: impl Into<String>, timestamp: i64) -> Self {
        Self { role: Role::User, content: content.into(), timestamp }
    }

    pub fn assistant(content: impl Into<String>, timestamp: i64) -> Self {
        Self { role: Role::Assistant, content: content.into(), timestamp }
    }
}

/// Whether sends go to the network or to the offline queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Online,
    Offline,
    Reconnecting,
}

/// Entry of the locally kept conversation list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub last_message: String,
    pub timestamp: i64,
}

/// Request body for `POST /api/chat`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub message: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub processing_time: u64,
    pub model: String,
    pub tokens_used: u32,
    pub cached: bool,
    pub endpoint: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response from `POST /api/chat`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: Message,
    pub conversation_id: String,
    pub metadata: ResponseMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_camel_case() {
        let req = SendMessageRequest {
            conversation_id: "conv-1".to_string(),
            message: "hi".to_string(),
            messages: vec![Message::user("earlier", 5)],
            idempotency_key: Some("msg-7".to_string()),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["conversationId"], "conv-1");
        assert_eq!(json["idempotencyKey"], "msg-7");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_parses_server_shape() {
        let body = r#"{
            "success": true,
            "message": { "role": "assistant", "content": "hi there", "timestamp": 42 },
            "conversationId": "conv-1",
            "metadata": {
                "processingTime": 12, "model": "fallback", "tokensUsed": 0,
                "cached": false, "endpoint": "e", "error": "service availability: HTTP 500"
            }
        }"#;
        let resp: SendMessageResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.message, Message::assistant("hi there", 42));
        assert_eq!(resp.metadata.model, "fallback");
        assert!(resp.metadata.error.is_some());
    }
}
