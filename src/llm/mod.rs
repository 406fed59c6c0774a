//! Stack client, wire types and provider traits.
//!
//! Provides a unified interface to the OpenAI-compatible stack this crate
//! talks to: response generation, content moderation and model listing.

mod client;
mod http_utils;

pub use client::{StackClient, VectorStoreEntry};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur while talking to the stack.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the stack's API.
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication.
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Error during JSON serialization or deserialization.
    #[error("JSON error: {0}")]
    JsonError(String),
    /// Any other unexpected error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// A message in a conversation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system).
    pub role: String,
    /// Text content of the message.
    pub content: String,
}

impl Message {
    /// Create a new user message.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }

    /// Create a new assistant message.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
        }
    }

    /// Create a new system message.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }
}

/// A tool descriptor handed to the stack's responses API.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDescriptor {
    /// Vector-store-backed retrieval over one or more knowledge bases.
    FileSearch {
        /// Identifiers of every vector store to search, aggregated.
        vector_store_ids: Vec<String>,
    },
    /// A remote tool server the model may delegate to.
    Mcp {
        /// Server label.
        server_label: String,
        /// Server endpoint.
        server_url: String,
        /// Approval policy for tool invocations.
        require_approval: String,
        /// Out-of-band headers, e.g. the acting user's identity.
        #[serde(skip_serializing_if = "Option::is_none")]
        headers: Option<HashMap<String, String>>,
        /// Restriction of the tools callable on this server.
        #[serde(skip_serializing_if = "Option::is_none")]
        allowed_tools: Option<Vec<String>>,
    },
}

/// A request against the stack's responses API.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseRequest {
    /// Full outgoing message list, system turns first.
    pub input: Vec<Message>,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Streaming flag; this crate always requests buffered responses.
    pub stream: bool,
    /// Tools available to the model. Omitted from the wire body entirely
    /// when `None`; some providers treat an empty list differently from an
    /// absent one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDescriptor>>,
}

/// A response object from the stack. Upstream shapes vary between versions
/// and code paths, so every field is modeled as present-or-absent and
/// unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderResponse {
    /// Response identifier; empty under throttling/quota conditions.
    pub id: Option<String>,
    /// Response status.
    pub status: Option<String>,
    /// Explicit error payload.
    pub error: Option<serde_json::Value>,
    /// Aggregated output text (the common case).
    pub output_text: Option<String>,
    /// Structured output items.
    pub output: Option<Vec<OutputItem>>,
    /// Tool invocations recorded on the response.
    pub tool_calls: Option<Vec<ToolCallStatus>>,
    /// Legacy completion-message payload.
    pub completion_message: Option<CompletionMessage>,
    /// Generic top-level content.
    pub content: Option<serde_json::Value>,
    /// Model that produced the response.
    pub model: Option<String>,
}

/// One entry of a structured output list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputItem {
    /// Entry type, e.g. `"message"`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Content parts of the entry.
    pub content: Option<Vec<OutputContent>>,
}

/// One content part of an output entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputContent {
    /// Part type, e.g. `"output_text"`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Textual payload of the part.
    pub text: Option<String>,
}

/// Error/status surface of a tool invocation recorded on a response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallStatus {
    /// Explicit error payload of the invocation.
    pub error: Option<serde_json::Value>,
    /// Invocation status.
    pub status: Option<String>,
}

/// Legacy completion-message payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionMessage {
    /// Explicit error payload.
    pub error: Option<serde_json::Value>,
    /// Message content; only string-valued content is extractable.
    pub content: Option<serde_json::Value>,
}

/// One entry of the stack's model list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelEntry {
    /// Model identifier.
    pub identifier: Option<String>,
    /// Model kind as reported by the stack (`"llm"`, `"embedding"`, ...).
    #[serde(rename = "api_model_type")]
    pub model_type: Option<String>,
}

/// Result of one moderation pass over a piece of content.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModerationResult {
    /// True when the shield flagged the content.
    #[serde(default)]
    pub flagged: bool,
    /// Per-category flag decisions.
    #[serde(default)]
    pub categories: HashMap<String, bool>,
    /// Per-category confidence scores.
    #[serde(default)]
    pub category_scores: HashMap<String, f64>,
    /// Shield-supplied user-facing refusal message.
    pub user_message: Option<String>,
}

/// Interface to the stack's responses API.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ResponsesProvider: Send + Sync {
    /// Generate a response for the assembled request.
    async fn create_response(&self, request: ResponseRequest)
        -> Result<ProviderResponse, LlmError>;

    /// List the models the stack serves.
    async fn list_models(&self) -> Result<Vec<ModelEntry>, LlmError>;
}

/// Interface to the stack's moderation API.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ModerationProvider: Send + Sync {
    /// Classify `input` with the given shield model.
    async fn moderate(&self, input: &str, shield_model: &str)
        -> Result<ModerationResult, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_search_descriptor_wire_shape() {
        let tool = ToolDescriptor::FileSearch {
            vector_store_ids: vec!["vs_1".to_string(), "vs_2".to_string()],
        };
        let value = serde_json::to_value(&tool).expect("serializable");
        assert_eq!(
            value,
            json!({"type": "file_search", "vector_store_ids": ["vs_1", "vs_2"]})
        );
    }

    #[test]
    fn mcp_descriptor_omits_absent_optionals() {
        let tool = ToolDescriptor::Mcp {
            server_label: "ticketing".to_string(),
            server_url: "http://ticketing:8000/sse".to_string(),
            require_approval: "never".to_string(),
            headers: None,
            allowed_tools: None,
        };
        let value = serde_json::to_value(&tool).expect("serializable");
        assert_eq!(
            value,
            json!({
                "type": "mcp",
                "server_label": "ticketing",
                "server_url": "http://ticketing:8000/sse",
                "require_approval": "never"
            })
        );
    }

    #[test]
    fn request_omits_tools_when_none() {
        let request = ResponseRequest {
            input: vec![Message::system(""), Message::user("hi")],
            model: "test-model".to_string(),
            temperature: 0.7,
            stream: false,
            tools: None,
        };
        let value = serde_json::to_value(&request).expect("serializable");
        assert!(value.get("tools").is_none());
        assert_eq!(value["input"][1]["content"], "hi");
    }

    #[test]
    fn provider_response_tolerates_sparse_payloads() {
        let response: ProviderResponse =
            serde_json::from_value(json!({"output_text": "Hello", "unknown_field": 42}))
                .expect("lenient deserialization");
        assert_eq!(response.output_text.as_deref(), Some("Hello"));
        assert!(response.id.is_none());
        assert!(response.output.is_none());

        let response: ProviderResponse = serde_json::from_value(json!({
            "id": "resp_1",
            "output": [
                {"type": "message", "content": [{"type": "output_text", "text": "Hi"}]}
            ]
        }))
        .expect("lenient deserialization");
        let output = response.output.expect("output present");
        assert_eq!(output[0].kind.as_deref(), Some("message"));
        let content = output[0].content.as_ref().expect("content present");
        assert_eq!(content[0].text.as_deref(), Some("Hi"));
    }
}
